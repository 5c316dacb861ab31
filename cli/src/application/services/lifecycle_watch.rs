//! Application service: follow a controller until it settles.
//!
//! Renders snapshot changes through a [`ProgressReporter`] and turns an
//! operator interrupt into a manual destroy.

use std::future::Future;

use reclaim_common::Mode;

use crate::application::ports::ProgressReporter;
use crate::application::services::controller::ControllerHandle;
use crate::domain::error::ControllerError;
use crate::domain::session::{DestroyReason, Phase, Snapshot};

/// Seconds at which the countdown is announced, besides every half minute.
const FINAL_SECONDS: u64 = 5;

/// Follow `handle` until the controller is back to `idle`, returning the final
/// snapshot. The first completion of `interrupt` requests a manual destroy.
///
/// # Errors
///
/// [`ControllerError::Stopped`] if the controller goes away first.
pub async fn follow<F>(
    handle: &ControllerHandle,
    reporter: &impl ProgressReporter,
    interrupt: F,
) -> Result<Snapshot, ControllerError>
where
    F: Future<Output = ()>,
{
    let mut snapshots = handle.subscribe();
    let mut view = View::default();
    let mut interrupted = false;
    tokio::pin!(interrupt);

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        view.render(&snapshot, reporter);
        if snapshot.phase == Phase::Idle {
            return Ok(snapshot);
        }
        tokio::select! {
            changed = snapshots.changed() => changed.map_err(|_| ControllerError::Stopped)?,
            () = &mut interrupt, if !interrupted => {
                interrupted = true;
                reporter.warn("Interrupted, destroying the environment now");
                if let Err(err) = handle.request_destroy(DestroyReason::Manual).await {
                    reporter.warn(&err.to_string());
                }
            }
        }
    }
}

/// Request a provision, then [`follow`] it. `interrupt` is watched from the
/// start, so an interrupt while the dispatch is in flight still destroys the
/// environment once the gateway has accepted it.
///
/// # Errors
///
/// The provision request's error, or those of [`follow`].
pub async fn provision_and_follow<F>(
    handle: &ControllerHandle,
    reporter: &impl ProgressReporter,
    interrupt: F,
) -> Result<Snapshot, ControllerError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let provision = handle.request_provision();
    tokio::pin!(provision);
    let mut interrupted = false;

    let dispatched = loop {
        tokio::select! {
            result = &mut provision => break result,
            () = &mut interrupt, if !interrupted => {
                interrupted = true;
                reporter.warn("Interrupted, destroying the environment once the dispatch is accepted");
            }
        }
    };
    dispatched?;

    if !interrupted {
        return follow(handle, reporter, interrupt).await;
    }
    if let Err(err) = handle.request_destroy(DestroyReason::Manual).await {
        reporter.warn(&err.to_string());
    }
    follow(handle, reporter, std::future::pending::<()>()).await
}

/// What has been shown so far.
#[derive(Debug, Default)]
struct View {
    phase: Option<Phase>,
    run_id: Option<String>,
    log_lines: usize,
    countdown: Option<u64>,
    last_error: Option<String>,
}

impl View {
    fn render(&mut self, snapshot: &Snapshot, reporter: &impl ProgressReporter) {
        let run_id = snapshot.run.as_ref().map(|run| run.run_id.clone());
        let phase_changed = self.phase != Some(snapshot.phase) || self.run_id != run_id;
        if self.run_id != run_id {
            self.log_lines = 0;
        }

        if phase_changed {
            self.announce(snapshot, reporter);
        }

        if let Some(run) = &snapshot.run {
            for line in run.logs.lines().skip(self.log_lines) {
                reporter.log_line(line);
                self.log_lines += 1;
            }
        }

        if let Some(seconds) = snapshot.countdown_seconds {
            let due = seconds % 30 == 0 || seconds <= FINAL_SECONDS;
            if !phase_changed && due && self.countdown != Some(seconds) {
                reporter.countdown(seconds);
            }
        }
        self.countdown = snapshot.countdown_seconds;

        if snapshot.last_error != self.last_error {
            if let Some(err) = &snapshot.last_error {
                reporter.warn(err);
            }
            self.last_error.clone_from(&snapshot.last_error);
        }

        self.phase = Some(snapshot.phase);
        self.run_id = run_id;
    }

    fn announce(&self, snapshot: &Snapshot, reporter: &impl ProgressReporter) {
        match (snapshot.phase, &snapshot.run) {
            (Phase::Dispatching, _) => reporter.step("Dispatching provision..."),
            (Phase::Polling, Some(run)) if run.action == Mode::Provision => {
                reporter.step(&format!("Provisioning (run {})", run.run_id));
            }
            (Phase::Polling, Some(run)) => {
                reporter.step(&format!("Destroying (run {})", run.run_id));
            }
            (Phase::ProvisionedArmed, _) => {
                let seconds = snapshot.countdown_seconds.unwrap_or_default();
                reporter.success(&format!("Environment ready, auto-destroy in {seconds}s"));
                if let Some(resource) = &snapshot.resource {
                    reporter.step(&format!("State key: {}", resource.state_key));
                }
            }
            (Phase::Destroying, _) => match snapshot.destroy_reason {
                Some(DestroyReason::Expired) => reporter.step("Lifetime expired, dispatching destroy..."),
                _ => reporter.step("Dispatching destroy..."),
            },
            (Phase::Idle, _) if self.phase.is_some() && snapshot.last_error.is_none() => {
                reporter.success("Environment destroyed");
            }
            (Phase::Idle | Phase::Polling, _) => {}
        }
    }
}
