//! JSON output helpers.
//!
//! Every `--json` code path prints one pretty-printed object on stdout: the
//! command's result, or the error object below when it fails.

use std::path::Path;

use anyhow::{Context, Result};
use reclaim_common::RunStatus;
use serde::Serialize;

use crate::domain::config::{ReclaimConfig, VALID_CONFIG_KEYS};
use crate::domain::session::Snapshot;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Pretty-print any serializable result.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_value<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}

/// Renders command results as JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Render the CLI version information.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        println!("{}", format_value(&serde_json::json!({ "version": version }))?);
        Ok(())
    }

    /// Render one status query.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_run_status(
        &self,
        run_id: &str,
        status: &RunStatus,
        raw: &str,
        logs: &str,
    ) -> Result<()> {
        let obj = serde_json::json!({
            "runId": run_id,
            "status": status,
            "reported": raw,
            "terminal": status.is_terminal(),
            "logs": logs,
        });
        println!("{}", format_value(&obj)?);
        Ok(())
    }

    /// Render a status query for a run the store has not seen yet.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_not_recorded(&self, run_id: &str) -> Result<()> {
        let obj = serde_json::json!({
            "runId": run_id,
            "status": serde_json::Value::Null,
            "recorded": false,
        });
        println!("{}", format_value(&obj)?);
        Ok(())
    }

    /// Render the final state of a lifecycle run.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_outcome(&self, snapshot: &Snapshot) -> Result<()> {
        println!("{}", format_value(snapshot)?);
        Ok(())
    }

    /// Render the configuration with secrets masked.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &ReclaimConfig, path: &Path) -> Result<()> {
        let settings: serde_json::Map<String, serde_json::Value> = VALID_CONFIG_KEYS
            .iter()
            .map(|key| {
                let value = config
                    .display_value(key)
                    .map_or(serde_json::Value::Null, serde_json::Value::String);
                ((*key).to_string(), value)
            })
            .collect();
        let obj = serde_json::json!({
            "path": path.display().to_string(),
            "settings": settings,
        });
        println!("{}", format_value(&obj)?);
        Ok(())
    }
}
