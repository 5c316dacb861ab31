//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;
use reclaim_common::RunStatus;

use crate::domain::config::{ReclaimConfig, VALID_CONFIG_KEYS};
use crate::domain::session::Snapshot;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.info(&format!("reclaim v{version}"));
    }

    /// Render one status query.
    pub fn render_run_status(&self, run_id: &str, status: &RunStatus, raw: &str, logs: &str) {
        self.ctx.kv("Run:", run_id);
        let label = if raw.trim().eq_ignore_ascii_case(status.as_str()) {
            status.to_string()
        } else {
            format!("{status} (reported '{}')", raw.trim())
        };
        self.ctx.kv("Status:", &label);
        self.ctx
            .kv("Terminal:", if status.is_terminal() { "yes" } else { "no" });
        if !logs.is_empty() {
            println!();
            self.ctx.header("Logs:");
            for line in logs.lines() {
                self.ctx.log_line(line);
            }
        }
    }

    /// Render the final state of a lifecycle run.
    pub fn render_outcome(&self, snapshot: &Snapshot) {
        match (&snapshot.last_error, &snapshot.resource) {
            (Some(err), Some(resource)) => {
                self.ctx.error(err);
                self.ctx.info(&format!(
                    "Environment may still exist. Retry: reclaim destroy --run-id {} --state-key {} --region {}",
                    resource.run_id, resource.state_key, resource.region
                ));
            }
            (Some(err), None) => self.ctx.error(err),
            (None, _) => self.ctx.success("Done"),
        }
    }

    /// Render the current reclaim configuration.
    pub fn render_config(&self, config: &ReclaimConfig, path: &std::path::Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for key in VALID_CONFIG_KEYS {
            let value = config
                .display_value(key)
                .unwrap_or_else(|| "(not set)".to_string());
            println!("  {:<30} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.label));
        for var in ["RECLAIM_CONFIG", "RECLAIM_ENDPOINT", "NO_COLOR"] {
            println!(
                "    {:<18} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!(
            "    {:<18} {}",
            "RECLAIM_API_KEY:",
            if std::env::var("RECLAIM_API_KEY").is_ok() {
                "(set)"
            } else {
                "(not set)"
            }
        );
        println!();
    }
}
