//! `reclaim status`: query one run.

use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::{Args, ValueEnum};
use reclaim_common::{Mode, validate_run_id};

use crate::app::AppContext;
use crate::application::services::polling;
use crate::domain::session::Observation;
use crate::infra::gateway::HttpGateway;
use crate::output::{Renderer, progress};

/// Kind of run being queried; decides how success tokens are read.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum RunKind {
    #[default]
    Provision,
    Destroy,
}

impl From<RunKind> for Mode {
    fn from(kind: RunKind) -> Self {
        match kind {
            RunKind::Provision => Mode::Provision,
            RunKind::Destroy => Mode::Destroy,
        }
    }
}

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Run id to query
    pub run_id: String,

    /// Whether the run is a provision or a destroy
    #[arg(long, value_enum, default_value_t = RunKind::Provision)]
    pub kind: RunKind,
}

/// Run the status command.
///
/// # Errors
///
/// Returns an error on an invalid run id, missing configuration, or an
/// unreachable gateway.
pub async fn run(app: &AppContext, args: &StatusArgs) -> Result<ExitCode> {
    validate_run_id(&args.run_id).map_err(|e| anyhow!("invalid run id: {e}"))?;
    let config = app.load_config()?;
    let gateway = HttpGateway::from_config(&config.gateway)?;

    let spinner = (!app.is_json() && app.output.show_progress())
        .then(|| progress::spinner(&format!("Querying run {}...", args.run_id)));
    let observation = polling::poll_once(&gateway, &args.run_id).await;
    if let Some(pb) = &spinner {
        progress::finish_clear(pb);
    }

    match observation {
        Observation::Reported { status: raw, logs } => {
            let status = config
                .lifecycle
                .vocabulary
                .normalize(&raw, args.kind.into());
            match app.renderer() {
                Renderer::Human(r) => r.render_run_status(&args.run_id, &status, &raw, &logs),
                Renderer::Json(r) => r.render_run_status(&args.run_id, &status, &raw, &logs)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Observation::NotRecorded => {
            match app.renderer() {
                Renderer::Human(_) => app
                    .output
                    .info(&format!("Run {} is not recorded yet.", args.run_id)),
                Renderer::Json(r) => r.render_not_recorded(&args.run_id)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Observation::Unreachable(err) => Err(anyhow!("cannot query run {}: {err}", args.run_id)),
        Observation::Rejected { status, message } => Err(anyhow!(
            "gateway rejected the query for run {} ({status}): {message}",
            args.run_id
        )),
    }
}
