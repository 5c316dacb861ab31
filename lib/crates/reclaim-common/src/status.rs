use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::Mode;

/// Canonical run status.
///
/// Engine tokens are mapped onto this closed set by
/// [`StatusVocabulary::normalize`]. Anything unrecognised becomes
/// [`RunStatus::Unknown`], which is never terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Queued,
    InProgress,
    Applied,
    Destroyed,
    Failed,
    Errored,
    Cancelled,
    DispatchFailed,
    Unknown(String),
}

impl RunStatus {
    /// Parse a canonical token, case-insensitively. `running` is a synonym
    /// for `in_progress`.
    #[must_use]
    pub fn from_token(raw: &str) -> Self {
        let token = raw.trim().to_ascii_lowercase();
        match token.as_str() {
            "queued" => Self::Queued,
            "in_progress" | "running" => Self::InProgress,
            "applied" => Self::Applied,
            "destroyed" => Self::Destroyed,
            "failed" => Self::Failed,
            "errored" => Self::Errored,
            "cancelled" => Self::Cancelled,
            "dispatch_failed" => Self::DispatchFailed,
            _ => Self::Unknown(token),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Applied
                | Self::Destroyed
                | Self::Failed
                | Self::Errored
                | Self::Cancelled
                | Self::DispatchFailed
        )
    }

    /// The status that completes a run of the given mode.
    #[must_use]
    pub fn success_for(mode: Mode) -> Self {
        match mode {
            Mode::Provision => Self::Applied,
            Mode::Destroy => Self::Destroyed,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Applied => "applied",
            Self::Destroyed => "destroyed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
            Self::DispatchFailed => "dispatch_failed",
            Self::Unknown(token) => token,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_token(&raw))
    }
}

/// Extra success tokens, per mode, that the workflow engine may report.
///
/// The canonical `applied` / `destroyed` tokens are always recognised; the
/// lists here add synonyms. A synonym listed for both modes (the default
/// `succeeded`) resolves to the run's own success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    pub applied: Vec<String>,
    pub destroyed: Vec<String>,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            applied: vec!["succeeded".to_string()],
            destroyed: vec!["succeeded".to_string()],
        }
    }
}

impl StatusVocabulary {
    /// Map an engine token onto a canonical status for a run of `mode`.
    #[must_use]
    pub fn normalize(&self, raw: &str, mode: Mode) -> RunStatus {
        let token = raw.trim().to_ascii_lowercase();
        let applied = Self::lists(&self.applied, &token);
        let destroyed = Self::lists(&self.destroyed, &token);
        match (applied, destroyed) {
            (true, true) => RunStatus::success_for(mode),
            (true, false) => RunStatus::Applied,
            (false, true) => RunStatus::Destroyed,
            (false, false) => RunStatus::from_token(&token),
        }
    }

    fn lists(tokens: &[String], token: &str) -> bool {
        tokens.iter().any(|t| t.trim().eq_ignore_ascii_case(token))
    }
}
