//! Property-based tests for the session state machine and config validation.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use chrono::Utc;
use proptest::prelude::*;

use reclaim_cli::domain::config::{VALID_CONFIG_KEYS, validate_config_key, validate_config_value};
use reclaim_cli::domain::session::{
    DestroyReason, Effect, Event, Observation, Phase, Session, SessionSettings,
};
use reclaim_common::{DispatchAccepted, Mode, RunStatus};

fn accept(session: &mut Session, effects: &[Effect]) -> Vec<Effect> {
    let request = effects
        .iter()
        .find_map(|e| match e {
            Effect::Dispatch(r) => Some(r.clone()),
            _ => None,
        })
        .expect("dispatch effect");
    session
        .handle(Event::DispatchAccepted {
            run_id: request.request_id.clone(),
            accepted: DispatchAccepted {
                request_id: request.request_id.clone(),
                run_id: None,
                state_key: request.state_key.clone(),
                mode: request.mode,
                region: request.region.clone(),
            },
        })
        .expect("accepted")
}

fn report(session: &mut Session, status: &str) -> Vec<Effect> {
    let run_id = session.current_run().expect("current run").run_id.clone();
    session
        .handle(Event::PollObserved {
            run_id,
            observation: Observation::Reported {
                status: status.to_string(),
                logs: String::new(),
            },
        })
        .expect("poll")
}

fn polling_provision() -> Session {
    let mut session = Session::new(SessionSettings {
        lifetime_secs: 3,
        ..SessionSettings::default()
    });
    let effects = session
        .handle(Event::ProvisionRequested {
            run_id: "prop".to_string(),
            at: Utc::now(),
        })
        .expect("idle");
    accept(&mut session, &effects);
    session
}

fn armed() -> (Session, u64) {
    let mut session = polling_provision();
    let arm = report(&mut session, "applied")
        .iter()
        .find_map(|e| match e {
            Effect::ArmCountdown { arm, .. } => Some(*arm),
            _ => None,
        })
        .expect("armed");
    (session, arm)
}

fn non_terminal_status() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("queued".to_string()),
        Just("running".to_string()),
        Just("in_progress".to_string()),
        Just("IN_PROGRESS".to_string()),
        "[a-z_]{1,16}".prop_filter("terminal token", |s| !RunStatus::from_token(s).is_terminal()
            && s != "succeeded"),
    ]
}

// ============================================================================
// Session properties
// ============================================================================

proptest! {
    /// Non-terminal and unknown statuses never arm the countdown.
    #[test]
    fn prop_non_terminal_statuses_keep_polling(statuses in prop::collection::vec(non_terminal_status(), 1..20)) {
        let mut session = polling_provision();
        for status in &statuses {
            let effects = report(&mut session, status);
            prop_assert!(
                !effects.iter().any(|e| matches!(e, Effect::ArmCountdown { .. })),
                "armed on non-terminal status {}", status
            );
        }
        prop_assert_eq!(session.phase(), Phase::Polling);
        prop_assert!(session.countdown_seconds().is_none());
    }

    /// Any interleaving of expiry ticks and manual destroys from the armed
    /// state dispatches exactly one destroy.
    #[test]
    fn prop_expiry_and_manual_destroy_dispatch_once(ops in prop::collection::vec(any::<bool>(), 1..24)) {
        let (mut session, arm) = armed();
        let mut destroys = 0;
        // Enough ticks to guarantee expiry regardless of the interleaving.
        let ticks = std::iter::repeat_n(true, 3);
        for tick in ops.into_iter().chain(ticks) {
            let event = if tick {
                Event::CountdownTick { arm, at: Utc::now() }
            } else {
                Event::DestroyRequested { reason: DestroyReason::Manual, at: Utc::now() }
            };
            let effects = session.handle(event).expect("never rejected once armed");
            destroys += effects
                .iter()
                .filter(|e| matches!(e, Effect::Dispatch(r) if r.mode == Mode::Destroy))
                .count();
        }
        prop_assert_eq!(destroys, 1);
        prop_assert_eq!(session.phase(), Phase::Destroying);
    }

    /// Logs observed on a run never get shorter.
    #[test]
    fn prop_logs_never_shrink(chunks in prop::collection::vec("[a-z ]{0,12}", 1..10)) {
        let mut session = polling_provision();
        let run_id = session.current_run().expect("run").run_id.clone();
        let mut longest = 0;
        for logs in chunks {
            session
                .handle(Event::PollObserved {
                    run_id: run_id.clone(),
                    observation: Observation::Reported { status: "running".to_string(), logs },
                })
                .expect("poll");
            let len = session.current_run().expect("run").logs.len();
            prop_assert!(len >= longest, "logs shrank from {} to {}", longest, len);
            longest = len;
        }
    }
}

// ============================================================================
// Config validation properties
// ============================================================================

const SECONDS_KEYS: &[&str] = &[
    "gateway.timeout_secs",
    "lifecycle.lifetime_secs",
    "lifecycle.poll_interval_secs",
];

proptest! {
    /// Keys outside the whitelist are always rejected.
    #[test]
    fn prop_unknown_keys_rejected(key in "[a-z]{1,10}\\.[a-z_]{1,12}") {
        prop_assume!(!VALID_CONFIG_KEYS.contains(&key.as_str()));
        prop_assert!(validate_config_key(&key).is_err());
    }

    /// Every seconds key accepts 1..=300.
    #[test]
    fn prop_seconds_in_range_accepted(n in 1u64..=300, idx in 0usize..3) {
        prop_assert!(validate_config_value(SECONDS_KEYS[idx], &n.to_string()).is_ok());
    }

    /// Non-numeric values are rejected for every seconds key.
    #[test]
    fn prop_non_numeric_seconds_rejected(value in "[a-z]{1,8}", idx in 0usize..3) {
        prop_assert!(validate_config_value(SECONDS_KEYS[idx], &value).is_err());
    }

    /// Lifetimes above a week are rejected.
    #[test]
    fn prop_lifetime_above_a_week_rejected(n in 604_801u64..10_000_000) {
        prop_assert!(validate_config_value("lifecycle.lifetime_secs", &n.to_string()).is_err());
    }
}

#[test]
fn test_every_valid_key_passes_key_validation() {
    for key in VALID_CONFIG_KEYS {
        assert!(validate_config_key(key).is_ok(), "{key}");
    }
}
