//! `reclaim up`: provision an environment and hold it for its lifetime.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::controller::{self, ControllerSettings};
use crate::application::services::lifecycle_watch;
use crate::domain::config::validate_config_value;
use crate::infra::gateway::HttpGateway;
use crate::output::{SilentReporter, TerminalReporter};

/// Arguments for the up command.
#[derive(Args, Default)]
pub struct UpArgs {
    /// Seconds the environment lives before it is destroyed automatically
    #[arg(long, value_name = "SECS")]
    pub lifetime: Option<u64>,

    /// Region to provision in
    #[arg(long)]
    pub region: Option<String>,
}

/// Run the up command.
///
/// # Errors
///
/// Returns an error on invalid arguments or missing gateway configuration.
/// Lifecycle failures are reported and mapped to a failing exit code.
pub async fn run(app: &AppContext, args: &UpArgs) -> Result<ExitCode> {
    let mut config = app.load_config()?;
    if let Some(secs) = args.lifetime {
        validate_config_value("lifecycle.lifetime_secs", &secs.to_string())?;
        config.lifecycle.lifetime_secs = secs;
    }
    if let Some(region) = &args.region {
        validate_config_value("gateway.region", region)?;
        config.gateway.region.clone_from(region);
    }
    let gateway = HttpGateway::from_config(&config.gateway)?;

    let (handle, worker) =
        controller::spawn(Arc::new(gateway), ControllerSettings::from_config(&config));

    let outcome = if app.is_json() {
        lifecycle_watch::provision_and_follow(&handle, &SilentReporter, super::ctrl_c()).await
    } else {
        let reporter = TerminalReporter::new(&app.output);
        lifecycle_watch::provision_and_follow(&handle, &reporter, super::ctrl_c()).await
    };
    drop(handle);
    let _ = worker.await;

    super::finish_lifecycle(app, &outcome?)
}
