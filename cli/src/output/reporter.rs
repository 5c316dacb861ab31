//! `TerminalReporter`: Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"  ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"  ⚠ {message}"` (never suppressed)
/// - `log_line()` prints the line dimmed and indented (suppressed when `ctx.quiet`)
/// - `countdown()` prints the seconds left (suppressed when `ctx.quiet`)
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "→".style(self.ctx.styles.info));
        }
    }

    fn success(&self, message: &str) {
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        // Lifecycle warnings carry failures; keep them visible under --quiet.
        eprintln!("  {} {message}", "⚠".style(self.ctx.styles.warning));
    }

    fn log_line(&self, line: &str) {
        self.ctx.log_line(line);
    }

    fn countdown(&self, seconds: u64) {
        if !self.ctx.quiet {
            println!(
                "  {} Auto-destroy in {} (Ctrl-C to destroy now)",
                "⏱".style(self.ctx.styles.countdown),
                format!("{seconds}s").style(self.ctx.styles.countdown)
            );
        }
    }
}

/// Reporter that prints nothing, for `--json` runs.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn log_line(&self, _line: &str) {}
    fn countdown(&self, _seconds: u64) {}
}
