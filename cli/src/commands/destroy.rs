//! `reclaim destroy`: reclaim an environment provisioned earlier.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Args;
use reclaim_common::{state_key, validate_region, validate_run_id, validate_state_key};

use crate::app::AppContext;
use crate::application::services::controller::{self, ControllerSettings};
use crate::application::services::lifecycle_watch;
use crate::domain::run::Resource;
use crate::domain::session::{DestroyReason, Session};
use crate::infra::gateway::HttpGateway;
use crate::output::{SilentReporter, TerminalReporter};

/// Arguments for the destroy command.
#[derive(Args)]
pub struct DestroyArgs {
    /// Run id of the provision that created the environment
    #[arg(long)]
    pub run_id: String,

    /// State key of the environment (default: derived from the run id)
    #[arg(long)]
    pub state_key: Option<String>,

    /// Region the environment lives in
    #[arg(long)]
    pub region: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Run the destroy command.
///
/// # Errors
///
/// Returns an error on invalid arguments, missing gateway configuration, or
/// a rejected destroy dispatch.
pub async fn run(app: &AppContext, args: &DestroyArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    validate_run_id(&args.run_id).map_err(|e| anyhow!("invalid --run-id: {e}"))?;
    let state_key = args
        .state_key
        .clone()
        .unwrap_or_else(|| state_key(&config.lifecycle.state_namespace, &args.run_id));
    validate_state_key(&state_key).map_err(|e| anyhow!("invalid --state-key: {e}"))?;
    let region = args
        .region
        .clone()
        .unwrap_or_else(|| config.gateway.region.clone());
    validate_region(&region).map_err(|e| anyhow!("invalid --region: {e}"))?;

    let gateway = HttpGateway::from_config(&config.gateway)?;

    if !args.yes
        && !app.confirm(
            &format!("Destroy environment {} ({state_key})?", args.run_id),
            true,
        )?
    {
        app.output.info("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let settings = ControllerSettings::from_config(&config);
    let session = Session::with_resource(
        settings.session.clone(),
        Resource {
            run_id: args.run_id.clone(),
            state_key,
            region,
        },
    );
    let (handle, worker) = controller::spawn_with_session(Arc::new(gateway), settings, session);

    if let Err(err) = handle.request_destroy(DestroyReason::Manual).await {
        drop(handle);
        let _ = worker.await;
        return Err(err.into());
    }

    let last = if app.is_json() {
        lifecycle_watch::follow(&handle, &SilentReporter, std::future::pending::<()>()).await?
    } else {
        let reporter = TerminalReporter::new(&app.output);
        lifecycle_watch::follow(&handle, &reporter, std::future::pending::<()>()).await?
    };
    drop(handle);
    let _ = worker.await;

    super::finish_lifecycle(app, &last)
}
