//! Domain types and validators for reclaim configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use anyhow::Result;
use reclaim_common::{
    DEFAULT_REGION, DEFAULT_STATE_NAMESPACE, StatusVocabulary, validate_region,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::session::SessionSettings;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "gateway.endpoint",
    "gateway.api_key",
    "gateway.region",
    "gateway.timeout_secs",
    "lifecycle.lifetime_secs",
    "lifecycle.poll_interval_secs",
    "lifecycle.state_namespace",
];

const MAX_POLL_INTERVAL_SECS: u64 = 300;
const MAX_LIFETIME_SECS: u64 = 7 * 24 * 3600;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.reclaim/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ReclaimConfig {
    pub gateway: GatewayConfig,
    pub lifecycle: LifecycleConfig,
}

/// Where and how to reach the dispatch gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub region: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            region: DEFAULT_REGION.to_string(),
            timeout_secs: 15,
        }
    }
}

/// Countdown, cadence and status vocabulary of the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    pub lifetime_secs: u64,
    pub poll_interval_secs: u64,
    pub state_namespace: String,
    pub destroy_retry_secs: u64,
    pub transient_error_threshold: u32,
    pub vocabulary: StatusVocabulary,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 120,
            poll_interval_secs: 5,
            state_namespace: DEFAULT_STATE_NAMESPACE.to_string(),
            destroy_retry_secs: 30,
            transient_error_threshold: 12,
            vocabulary: StatusVocabulary::default(),
        }
    }
}

impl ReclaimConfig {
    /// Set a validated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "gateway.endpoint" => self.gateway.endpoint = Some(value.trim().to_string()),
            "gateway.api_key" => self.gateway.api_key = Some(value.to_string()),
            "gateway.region" => self.gateway.region = value.to_string(),
            "gateway.timeout_secs" => self.gateway.timeout_secs = parse_secs(value),
            "lifecycle.lifetime_secs" => self.lifecycle.lifetime_secs = parse_secs(value),
            "lifecycle.poll_interval_secs" => {
                self.lifecycle.poll_interval_secs = parse_secs(value);
            }
            "lifecycle.state_namespace" => {
                self.lifecycle.state_namespace = value.trim_end_matches('/').to_string();
            }
            _ => {}
        }
        Ok(())
    }

    /// Value of a key for display. The API key is masked.
    #[must_use]
    pub fn display_value(&self, key: &str) -> Option<String> {
        match key {
            "gateway.endpoint" => self.gateway.endpoint.clone(),
            "gateway.api_key" => self.gateway.api_key.as_deref().map(mask_secret),
            "gateway.region" => Some(self.gateway.region.clone()),
            "gateway.timeout_secs" => Some(self.gateway.timeout_secs.to_string()),
            "lifecycle.lifetime_secs" => Some(self.lifecycle.lifetime_secs.to_string()),
            "lifecycle.poll_interval_secs" => Some(self.lifecycle.poll_interval_secs.to_string()),
            "lifecycle.state_namespace" => Some(self.lifecycle.state_namespace.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            lifetime_secs: self.lifecycle.lifetime_secs.max(1),
            region: self.gateway.region.clone(),
            state_namespace: self.lifecycle.state_namespace.clone(),
            vocabulary: self.lifecycle.vocabulary.clone(),
            destroy_retry_secs: self.lifecycle.destroy_retry_secs.max(1),
            transient_error_threshold: self.lifecycle.transient_error_threshold,
        }
    }
}

fn parse_secs(value: &str) -> u64 {
    value.trim().parse().unwrap_or_default()
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "********".to_string()
    } else {
        format!("{visible}********")
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |valid: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        valid: valid.to_string(),
    };
    match key {
        "gateway.endpoint" => {
            let v = value.trim();
            if !(v.starts_with("https://") || v.starts_with("http://")) || v.contains(char::is_whitespace) {
                return Err(invalid("an http:// or https:// URL").into());
            }
        }
        "gateway.api_key" => {
            if value.trim().is_empty() {
                return Err(invalid("a non-empty key").into());
            }
        }
        "gateway.region" => {
            if validate_region(value).is_err() {
                return Err(invalid("a region name such as us-east-2").into());
            }
        }
        "gateway.timeout_secs" => check_secs(value, 1, MAX_POLL_INTERVAL_SECS)
            .map_err(|()| invalid("1-300"))?,
        "lifecycle.lifetime_secs" => {
            check_secs(value, 1, MAX_LIFETIME_SECS).map_err(|()| invalid("1-604800"))?;
        }
        "lifecycle.poll_interval_secs" => {
            check_secs(value, 1, MAX_POLL_INTERVAL_SECS).map_err(|()| invalid("1-300"))?;
        }
        "lifecycle.state_namespace" => {
            let v = value.trim_end_matches('/');
            let ok = !v.is_empty()
                && !v.starts_with('/')
                && v.split('/').all(|s| !s.is_empty() && s != "..")
                && v.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
            if !ok {
                return Err(invalid("a relative path such as multicloud-iac/aws").into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_secs(value: &str, min: u64, max: u64) -> Result<(), ()> {
    match value.trim().parse::<u64>() {
        Ok(n) if (min..=max).contains(&n) => Ok(()),
        _ => Err(()),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
