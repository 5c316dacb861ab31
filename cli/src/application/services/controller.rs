//! Application service: the lifecycle controller actor.
//!
//! One task owns the [`Session`]. Operator requests arrive on a command
//! channel, poll results and countdown ticks on an event channel; both are
//! drained by the same `select!` loop, so every transition is serialized.
//! Dispatch calls are awaited inside the loop: nothing else is processed
//! while one is in flight.
//!
//! Observers read state through a `watch` channel of [`Snapshot`]s published
//! after every processed event.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reclaim_common::DispatchRequest;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::application::ports::DispatchGateway;
use crate::application::services::polling;
use crate::application::services::timers::{self, TimerSlot};
use crate::domain::config::ReclaimConfig;
use crate::domain::error::ControllerError;
use crate::domain::run::generate_run_id;
use crate::domain::session::{DestroyReason, Effect, Event, Session, SessionSettings, Snapshot};

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 64;

/// Controller tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub session: SessionSettings,
    pub poll_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl ControllerSettings {
    #[must_use]
    pub fn from_config(config: &ReclaimConfig) -> Self {
        Self {
            session: config.session_settings(),
            poll_interval: Duration::from_secs(config.lifecycle.poll_interval_secs.max(1)),
        }
    }
}

enum Command {
    Provision {
        reply: oneshot::Sender<Result<String, ControllerError>>,
    },
    Destroy {
        reason: DestroyReason,
        reply: oneshot::Sender<Result<(), ControllerError>>,
    },
}

/// Cloneable handle to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl ControllerHandle {
    /// Dispatch a provision run. Resolves once the dispatch has been accepted
    /// or has failed, with the id being polled.
    ///
    /// # Errors
    ///
    /// `Busy`/`UnreclaimedResource` if the request is refused, `Dispatch` if
    /// the gateway rejected it, `Stopped` if the controller is gone.
    pub async fn request_provision(&self) -> Result<String, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Provision { reply })
            .await
            .map_err(|_| ControllerError::Stopped)?;
        rx.await.map_err(|_| ControllerError::Stopped)?
    }

    /// Dispatch a destroy of the known resource. A no-op if a destroy is
    /// already under way.
    ///
    /// # Errors
    ///
    /// `NoActiveResource` if nothing is known, `Dispatch` if the gateway
    /// rejected it, `Stopped` if the controller is gone.
    pub async fn request_destroy(&self, reason: DestroyReason) -> Result<(), ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Destroy { reason, reply })
            .await
            .map_err(|_| ControllerError::Stopped)?;
        rx.await.map_err(|_| ControllerError::Stopped)?
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }
}

/// Start a controller with an empty session.
pub fn spawn(
    gateway: Arc<dyn DispatchGateway>,
    settings: ControllerSettings,
) -> (ControllerHandle, JoinHandle<()>) {
    let session = Session::new(settings.session.clone());
    spawn_with_session(gateway, settings, session)
}

/// Start a controller around an existing session.
pub fn spawn_with_session(
    gateway: Arc<dyn DispatchGateway>,
    settings: ControllerSettings,
    session: Session,
) -> (ControllerHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

    let controller = Controller {
        session,
        gateway,
        poll_interval: settings.poll_interval,
        poller: TimerSlot::new("poll"),
        countdown: TimerSlot::new("countdown"),
        events_tx,
        snapshot_tx,
    };
    let task = tokio::spawn(controller.run(commands_rx, events_rx));
    let handle = ControllerHandle {
        commands: commands_tx,
        snapshots: snapshot_rx,
    };
    (handle, task)
}

struct Controller {
    session: Session,
    gateway: Arc<dyn DispatchGateway>,
    poll_interval: Duration,
    poller: TimerSlot,
    countdown: TimerSlot,
    events_tx: mpsc::Sender<Event>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl Controller {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<Event>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
                Some(event) = events.recv() => {
                    if let Err(err) = self.apply(event).await {
                        tracing::debug!(error = %err, "background event rejected");
                    }
                }
            }
        }
        self.poller.cancel();
        self.countdown.cancel();
        tracing::debug!("lifecycle controller stopped");
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Provision { reply } => {
                let run_id = generate_run_id();
                let result = self
                    .apply(Event::ProvisionRequested {
                        run_id: run_id.clone(),
                        at: Utc::now(),
                    })
                    .await
                    .map(|()| {
                        self.session
                            .current_run()
                            .map_or(run_id, |run| run.run_id.clone())
                    });
                let _ = reply.send(result);
            }
            Command::Destroy { reason, reply } => {
                let result = self
                    .apply(Event::DestroyRequested {
                        reason,
                        at: Utc::now(),
                    })
                    .await;
                let _ = reply.send(result);
            }
        }
    }

    /// Run `event` and every event its effects produce, publishing a
    /// snapshot after each transition. The first error is returned.
    async fn apply(&mut self, event: Event) -> Result<(), ControllerError> {
        let mut outcome = Ok(());
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let kind = event.kind();
            let before = self.session.phase();
            let effects = match self.session.handle(event) {
                Ok(effects) => effects,
                Err(err) => {
                    tracing::warn!(event = kind, error = %err, "request rejected");
                    if outcome.is_ok() {
                        outcome = Err(err);
                    }
                    Vec::new()
                }
            };
            let after = self.session.phase();
            if before != after {
                tracing::debug!(event = kind, from = %before, to = %after, "transition");
            }
            // Published before the effects run, so an in-flight dispatch is visible.
            self.snapshot_tx.send_replace(self.session.snapshot());

            for effect in effects {
                if let Some((next, failure)) = self.perform(effect).await {
                    if let (Some(err), true) = (failure, outcome.is_ok()) {
                        outcome = Err(err);
                    }
                    queue.push_back(next);
                }
            }
        }
        outcome
    }

    /// Carry out one effect. Dispatch yields the follow-up event, and the
    /// error to report when the dispatch failed.
    async fn perform(&mut self, effect: Effect) -> Option<(Event, Option<ControllerError>)> {
        match effect {
            Effect::Dispatch(request) => Some(self.dispatch(request).await),
            Effect::StartPolling { run_id } => {
                self.poller.replace(polling::spawn_poller(
                    Arc::clone(&self.gateway),
                    run_id,
                    self.poll_interval,
                    self.events_tx.clone(),
                ));
                None
            }
            Effect::StopPolling => {
                self.poller.cancel();
                None
            }
            Effect::ArmCountdown { arm, seconds } => {
                self.countdown.replace(timers::spawn_countdown(
                    arm,
                    seconds,
                    self.events_tx.clone(),
                ));
                None
            }
            Effect::DisarmCountdown => {
                self.countdown.cancel();
                None
            }
        }
    }

    async fn dispatch(&self, request: DispatchRequest) -> (Event, Option<ControllerError>) {
        let run_id = request.request_id.clone();
        tracing::info!(
            run_id = %run_id,
            mode = %request.mode,
            region = %request.region,
            state_key = %request.state_key,
            "dispatching"
        );
        match self.gateway.dispatch(&request).await {
            Ok(accepted) => {
                tracing::info!(run_id = %accepted.tracking_id(), "dispatch accepted");
                (Event::DispatchAccepted { run_id, accepted }, None)
            }
            Err(err) => {
                tracing::warn!(run_id = %run_id, error = %err, "dispatch failed");
                let message = err.to_string();
                let failure = ControllerError::Dispatch {
                    action: request.mode,
                    message: message.clone(),
                };
                (
                    Event::DispatchFailed {
                        run_id,
                        error: message,
                    },
                    Some(failure),
                )
            }
        }
    }
}
