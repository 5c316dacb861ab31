//! Version command

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::output::Renderer;

/// Run the version command.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let version = env!("CARGO_PKG_VERSION");
    match app.renderer() {
        Renderer::Human(r) => r.render_version(version),
        Renderer::Json(r) => r.render_version(version)?,
    }
    Ok(ExitCode::SUCCESS)
}
