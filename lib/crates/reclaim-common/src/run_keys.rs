/// Run store key prefixes
pub mod keys {
    /// Run records
    /// Format: reclaim:run:{run_id}
    /// Value: JSON-serialized RunRecord
    /// TTL: ttl::RUN_RECORD_SECS
    pub const RUN: &str = "reclaim:run";
}

/// TTL constants
pub mod ttl {
    /// Run record retention (7 days)
    pub const RUN_RECORD_SECS: u64 = 7 * 24 * 3600;
}

/// Namespace under which state keys are derived when none is given.
pub const DEFAULT_STATE_NAMESPACE: &str = "multicloud-iac/aws";

/// Region used when a request does not name one.
pub const DEFAULT_REGION: &str = "us-east-2";

const MAX_RUN_ID_LEN: usize = 128;
const MAX_STATE_KEY_LEN: usize = 512;
const MAX_REGION_LEN: usize = 32;

pub fn run_key(run_id: &str) -> String {
    format!("{}:{}", keys::RUN, run_id)
}

/// Derive the state key for a run: `{namespace}/{run_id}.tfstate`.
pub fn state_key(namespace: &str, run_id: &str) -> String {
    let namespace = namespace.trim().trim_end_matches('/');
    if namespace.is_empty() {
        format!("{run_id}.tfstate")
    } else {
        format!("{namespace}/{run_id}.tfstate")
    }
}

/// Validate a run id: 1-128 chars of `[A-Za-z0-9._-]`, not starting with `.`.
/// Always call before building store keys from untrusted input.
pub fn validate_run_id(run_id: &str) -> Result<(), &'static str> {
    if run_id.is_empty() {
        return Err("run id must not be empty");
    }
    if run_id.len() > MAX_RUN_ID_LEN {
        return Err("run id must be at most 128 characters");
    }
    if run_id.starts_with('.') {
        return Err("run id must not start with '.'");
    }
    if !run_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("run id may only contain [A-Za-z0-9._-]");
    }
    Ok(())
}

/// Validate a state key: a relative path of `[A-Za-z0-9._/-]` with no `..` segment.
pub fn validate_state_key(key: &str) -> Result<(), &'static str> {
    if key.is_empty() {
        return Err("state key must not be empty");
    }
    if key.len() > MAX_STATE_KEY_LEN {
        return Err("state key must be at most 512 characters");
    }
    if key.starts_with('/') {
        return Err("state key must be relative");
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err("state key must not contain empty or '..' segments");
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err("state key may only contain [A-Za-z0-9._/-]");
    }
    Ok(())
}

/// Validate a region name such as `us-east-2`.
pub fn validate_region(region: &str) -> Result<(), &'static str> {
    if region.is_empty() || region.len() > MAX_REGION_LEN {
        return Err("region must be 1-32 characters");
    }
    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("region may only contain [a-z0-9-]");
    }
    Ok(())
}
