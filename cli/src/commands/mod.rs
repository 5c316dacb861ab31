//! Command implementations

pub mod config;
pub mod destroy;
pub mod status;
pub mod up;
pub mod version;

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::domain::session::Snapshot;
use crate::output::Renderer;

/// Print how a lifecycle run ended and pick the exit code.
pub(crate) fn finish_lifecycle(app: &AppContext, snapshot: &Snapshot) -> Result<ExitCode> {
    match app.renderer() {
        Renderer::Human(r) => r.render_outcome(snapshot),
        Renderer::Json(r) => r.render_outcome(snapshot)?,
    }
    Ok(if snapshot.last_error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Completes on the first Ctrl-C. Never completes if the handler cannot be
/// installed.
pub(crate) async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
