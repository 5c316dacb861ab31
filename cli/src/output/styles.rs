//! Output styles (owo-colors stylesheet).

use owo_colors::Style;

/// Stylesheet for terminal output. `Styles::default()` is the plain,
/// uncolored sheet.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    /// Step arrows and informational notes.
    pub info: Style,
    /// Workflow log lines and config keys.
    pub dim: Style,
    /// Section labels such as `Environment:`.
    pub label: Style,
    pub header: Style,
    /// Seconds left before auto-destroy.
    pub countdown: Style,
}

impl Styles {
    /// The colored sheet used on a TTY.
    #[must_use]
    pub fn colored() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            info: Style::new().blue(),
            dim: Style::new().dimmed(),
            label: Style::new().bold(),
            header: Style::new().bold().cyan(),
            countdown: Style::new().bold().magenta(),
        }
    }
}
