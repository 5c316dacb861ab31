//! The lifecycle state machine.
//!
//! [`Session::handle`] is a pure step: it takes one [`Event`], updates the
//! session and returns the [`Effect`]s the controller must carry out, in
//! order. Timers, HTTP calls and channels live in
//! `application::services::controller`; nothing here suspends.
//!
//! Destroy is entered from a single place (`begin_destroy`), which leaves
//! `provisioned-armed` and emits `DisarmCountdown` ahead of the destroy
//! `Dispatch`. Whichever of countdown expiry and manual destroy arrives second
//! finds the session already in `destroying` and produces no effects.

use std::fmt;

use chrono::{DateTime, Utc};
use reclaim_common::{
    DEFAULT_REGION, DEFAULT_STATE_NAMESPACE, DispatchAccepted, DispatchRequest, Mode, RunStatus,
    StatusVocabulary,
};
use serde::Serialize;

use crate::domain::error::ControllerError;
use crate::domain::run::{Resource, Run, destroy_run_id};

// ── Phases ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Dispatching,
    Polling,
    ProvisionedArmed,
    Destroying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Polling => "polling",
            Self::ProvisionedArmed => "provisioned-armed",
            Self::Destroying => "destroying",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyReason {
    Manual,
    Expired,
}

// ── Events and effects ────────────────────────────────────────────────────────

/// Result of one status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// 404: the engine has not written the run yet.
    NotRecorded,
    Reported { status: String, logs: String },
    Unreachable(String),
    /// The gateway answered with an error status; retrying will not help.
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ProvisionRequested {
        run_id: String,
        at: DateTime<Utc>,
    },
    DestroyRequested {
        reason: DestroyReason,
        at: DateTime<Utc>,
    },
    DispatchAccepted {
        run_id: String,
        accepted: DispatchAccepted,
    },
    DispatchFailed {
        run_id: String,
        error: String,
    },
    PollObserved {
        run_id: String,
        observation: Observation,
    },
    CountdownTick {
        arm: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProvisionRequested { .. } => "provision_requested",
            Self::DestroyRequested { .. } => "destroy_requested",
            Self::DispatchAccepted { .. } => "dispatch_accepted",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::PollObserved { .. } => "poll_observed",
            Self::CountdownTick { .. } => "countdown_tick",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Dispatch(DispatchRequest),
    StartPolling { run_id: String },
    StopPolling,
    /// `arm` tags the ticks so ticks from a replaced countdown are ignored.
    ArmCountdown { arm: u64, seconds: u64 },
    DisarmCountdown,
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Countdown budget once provisioned.
    pub lifetime_secs: u64,
    pub region: String,
    pub state_namespace: String,
    pub vocabulary: StatusVocabulary,
    /// Countdown re-armed when a destroy dispatched at expiry fails.
    pub destroy_retry_secs: u64,
    /// Consecutive unreachable polls before a notice is raised.
    pub transient_error_threshold: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lifetime_secs: 120,
            region: DEFAULT_REGION.to_string(),
            state_namespace: DEFAULT_STATE_NAMESPACE.to_string(),
            vocabulary: StatusVocabulary::default(),
            destroy_retry_secs: 30,
            transient_error_threshold: 12,
        }
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// What the presentation layer sees after every processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub run: Option<Run>,
    pub resource: Option<Resource>,
    pub countdown_seconds: Option<u64>,
    pub last_error: Option<String>,
    pub outputs_visible: bool,
    pub destroy_reason: Option<DestroyReason>,
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Where to return to if a destroy dispatch is rejected.
#[derive(Debug, Clone)]
enum Resume {
    Idle,
    Polling(Run),
    Armed { run: Run, remaining: u64 },
}

#[derive(Debug, Clone)]
pub struct Session {
    settings: SessionSettings,
    phase: Phase,
    current_run: Option<Run>,
    resource: Option<Resource>,
    resume: Option<Resume>,
    countdown_seconds: Option<u64>,
    arm: u64,
    destroy_attempts: u32,
    transient_failures: u32,
    last_error: Option<String>,
    destroy_reason: Option<DestroyReason>,
}

impl Session {
    #[must_use]
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            phase: Phase::Idle,
            current_run: None,
            resource: None,
            resume: None,
            countdown_seconds: None,
            arm: 0,
            destroy_attempts: 0,
            transient_failures: 0,
            last_error: None,
            destroy_reason: None,
        }
    }

    /// An idle session that already knows a resource, for reclaiming an
    /// environment provisioned by another process.
    #[must_use]
    pub fn with_resource(settings: SessionSettings, resource: Resource) -> Self {
        let mut session = Self::new(settings);
        session.resource = Some(resource);
        session
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn current_run(&self) -> Option<&Run> {
        self.current_run.as_ref()
    }

    #[must_use]
    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    #[must_use]
    pub fn countdown_seconds(&self) -> Option<u64> {
        self.countdown_seconds
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            run: self.current_run.clone(),
            resource: self.resource.clone(),
            countdown_seconds: self.countdown_seconds,
            last_error: self.last_error.clone(),
            outputs_visible: self.phase == Phase::ProvisionedArmed,
            destroy_reason: self.destroy_reason,
        }
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Rejected operator requests: [`ControllerError::Busy`],
    /// [`ControllerError::NoActiveResource`] and
    /// [`ControllerError::UnreclaimedResource`]. A rejected request changes
    /// nothing but `last_error`.
    pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>, ControllerError> {
        match event {
            Event::ProvisionRequested { run_id, at } => self.on_provision_requested(run_id, at),
            Event::DestroyRequested { reason, at } => self.begin_destroy(reason, at),
            Event::DispatchAccepted { run_id, accepted } => {
                Ok(self.on_dispatch_accepted(&run_id, &accepted))
            }
            Event::DispatchFailed { run_id, error } => Ok(self.on_dispatch_failed(&run_id, error)),
            Event::PollObserved {
                run_id,
                observation,
            } => Ok(self.on_poll(&run_id, observation)),
            Event::CountdownTick { arm, at } => self.on_tick(arm, at),
        }
    }

    fn on_provision_requested(
        &mut self,
        run_id: String,
        at: DateTime<Utc>,
    ) -> Result<Vec<Effect>, ControllerError> {
        if self.phase != Phase::Idle {
            return Err(ControllerError::Busy { phase: self.phase });
        }
        if let Some(resource) = &self.resource {
            let err = ControllerError::UnreclaimedResource {
                run_id: resource.run_id.clone(),
            };
            self.last_error = Some(err.to_string());
            return Err(err);
        }
        let run = Run::provision(
            run_id,
            &self.settings.state_namespace,
            &self.settings.region,
            at,
        );
        let request = run.dispatch_request();
        self.current_run = Some(run);
        self.phase = Phase::Dispatching;
        self.destroy_attempts = 0;
        self.destroy_reason = None;
        Ok(vec![Effect::Dispatch(request)])
    }

    fn begin_destroy(
        &mut self,
        reason: DestroyReason,
        at: DateTime<Utc>,
    ) -> Result<Vec<Effect>, ControllerError> {
        match self.phase {
            Phase::Destroying => return Ok(Vec::new()),
            Phase::Polling if self.current_action() == Some(Mode::Destroy) => {
                return Ok(Vec::new());
            }
            Phase::Dispatching => return Err(ControllerError::Busy { phase: self.phase }),
            Phase::Idle | Phase::Polling | Phase::ProvisionedArmed => {}
        }
        let Some(resource) = self.resource.clone() else {
            let err = ControllerError::NoActiveResource;
            self.last_error = Some(err.to_string());
            return Err(err);
        };

        let resume = match (self.phase, self.current_run.take()) {
            (Phase::ProvisionedArmed, Some(run)) => Resume::Armed {
                run,
                remaining: self.countdown_seconds.unwrap_or(0),
            },
            (Phase::Polling, Some(run)) => Resume::Polling(run),
            _ => Resume::Idle,
        };
        self.destroy_attempts += 1;
        let run = Run::destroy(
            destroy_run_id(&resource.run_id, self.destroy_attempts),
            &resource,
            at,
        );
        let request = run.dispatch_request();

        self.resume = Some(resume);
        self.current_run = Some(run);
        self.phase = Phase::Destroying;
        self.countdown_seconds = None;
        self.transient_failures = 0;
        self.destroy_reason = Some(reason);
        Ok(vec![
            Effect::DisarmCountdown,
            Effect::StopPolling,
            Effect::Dispatch(request),
        ])
    }

    fn on_dispatch_accepted(&mut self, run_id: &str, accepted: &DispatchAccepted) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Dispatching | Phase::Destroying) {
            return Vec::new();
        }
        let Some(run) = self
            .current_run
            .as_mut()
            .filter(|run| run.run_id == run_id)
        else {
            return Vec::new();
        };
        run.assign(accepted);
        let tracking_id = run.run_id.clone();
        let provisioned = (run.action == Mode::Provision).then(|| run.resource());

        if let Some(resource) = provisioned {
            self.resource = Some(resource);
        }
        self.resume = None;
        self.phase = Phase::Polling;
        self.last_error = None;
        self.transient_failures = 0;
        vec![Effect::StartPolling {
            run_id: tracking_id,
        }]
    }

    fn on_dispatch_failed(&mut self, run_id: &str, error: String) -> Vec<Effect> {
        if !self
            .current_run
            .as_ref()
            .is_some_and(|run| run.run_id == run_id)
        {
            return Vec::new();
        }
        match self.phase {
            Phase::Dispatching => {
                self.current_run = None;
                self.phase = Phase::Idle;
                self.last_error = Some(
                    ControllerError::Dispatch {
                        action: Mode::Provision,
                        message: error,
                    }
                    .to_string(),
                );
                Vec::new()
            }
            Phase::Destroying => {
                self.last_error = Some(
                    ControllerError::Dispatch {
                        action: Mode::Destroy,
                        message: error,
                    }
                    .to_string(),
                );
                self.restore()
            }
            Phase::Idle | Phase::Polling | Phase::ProvisionedArmed => Vec::new(),
        }
    }

    /// Return to the phase held before a rejected destroy dispatch.
    fn restore(&mut self) -> Vec<Effect> {
        self.destroy_reason = None;
        match self.resume.take().unwrap_or(Resume::Idle) {
            Resume::Idle => {
                self.current_run = None;
                self.phase = Phase::Idle;
                Vec::new()
            }
            Resume::Polling(run) => {
                let run_id = run.run_id.clone();
                self.current_run = Some(run);
                self.phase = Phase::Polling;
                vec![Effect::StartPolling { run_id }]
            }
            Resume::Armed { run, remaining } => {
                let seconds = if remaining == 0 {
                    self.settings.destroy_retry_secs.max(1)
                } else {
                    remaining
                };
                self.current_run = Some(run);
                self.phase = Phase::ProvisionedArmed;
                vec![self.arm_countdown(seconds)]
            }
        }
    }

    fn on_poll(&mut self, run_id: &str, observation: Observation) -> Vec<Effect> {
        if self.phase != Phase::Polling {
            return Vec::new();
        }
        let Some(run) = self
            .current_run
            .as_mut()
            .filter(|run| run.run_id == run_id)
        else {
            return Vec::new();
        };

        let (status, action) = match observation {
            Observation::NotRecorded => {
                self.transient_failures = 0;
                return Vec::new();
            }
            Observation::Unreachable(message) => {
                self.transient_failures = self.transient_failures.saturating_add(1);
                if self.transient_failures == self.settings.transient_error_threshold {
                    self.last_error = Some(
                        ControllerError::TransientPoll {
                            attempts: self.transient_failures,
                            message,
                        }
                        .to_string(),
                    );
                }
                return Vec::new();
            }
            Observation::Rejected { status, message } => {
                self.transient_failures = 0;
                return self.on_rejected(status, message);
            }
            Observation::Reported { status, logs } => {
                let status = self.settings.vocabulary.normalize(&status, run.action);
                run.observe_logs(&logs);
                run.status = status.clone();
                (status, run.action)
            }
        };

        if self.transient_failures >= self.settings.transient_error_threshold {
            self.last_error = None;
        }
        self.transient_failures = 0;
        if status.is_terminal() {
            self.on_terminal(action, &status)
        } else {
            Vec::new()
        }
    }

    /// Polling stops for good. The resource is kept since the run may well
    /// have gone through.
    fn on_rejected(&mut self, status: u16, message: String) -> Vec<Effect> {
        let (action, run_id) = self
            .current_run
            .take()
            .map_or((Mode::Provision, String::new()), |run| (run.action, run.run_id));
        self.last_error = Some(
            ControllerError::StatusRejected {
                action,
                run_id,
                status,
                message,
            }
            .to_string(),
        );
        self.countdown_seconds = None;
        self.phase = Phase::Idle;
        vec![Effect::StopPolling]
    }

    fn on_terminal(&mut self, action: Mode, status: &RunStatus) -> Vec<Effect> {
        match (action, status) {
            (Mode::Provision, RunStatus::Applied) => {
                self.last_error = None;
                self.phase = Phase::ProvisionedArmed;
                vec![
                    Effect::StopPolling,
                    self.arm_countdown(self.settings.lifetime_secs),
                ]
            }
            (Mode::Destroy, RunStatus::Destroyed) => {
                self.current_run = None;
                self.resource = None;
                self.countdown_seconds = None;
                self.phase = Phase::Idle;
                self.last_error = None;
                self.destroy_attempts = 0;
                vec![Effect::StopPolling]
            }
            _ => {
                let run_id = self
                    .current_run
                    .take()
                    .map(|run| run.run_id)
                    .unwrap_or_default();
                self.last_error = Some(
                    ControllerError::RemoteFailure {
                        action,
                        run_id,
                        status: status.to_string(),
                    }
                    .to_string(),
                );
                // A failed destroy keeps the resource so it can be retried.
                if action == Mode::Provision {
                    self.resource = None;
                }
                self.countdown_seconds = None;
                self.phase = Phase::Idle;
                vec![Effect::StopPolling]
            }
        }
    }

    fn on_tick(&mut self, arm: u64, at: DateTime<Utc>) -> Result<Vec<Effect>, ControllerError> {
        if self.phase != Phase::ProvisionedArmed || arm != self.arm {
            return Ok(Vec::new());
        }
        let remaining = self.countdown_seconds.unwrap_or(0).saturating_sub(1);
        self.countdown_seconds = Some(remaining);
        if remaining > 0 {
            return Ok(Vec::new());
        }
        self.begin_destroy(DestroyReason::Expired, at)
    }

    fn arm_countdown(&mut self, seconds: u64) -> Effect {
        self.arm += 1;
        self.countdown_seconds = Some(seconds);
        Effect::ArmCountdown {
            arm: self.arm,
            seconds,
        }
    }

    fn current_action(&self) -> Option<Mode> {
        self.current_run.as_ref().map(|run| run.action)
    }
}
