//! End-to-end behaviour of the lifecycle controller against a scripted
//! gateway, on a paused clock.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use reclaim_cli::application::ports::DispatchGateway;
use reclaim_cli::application::services::controller::{self, ControllerHandle};
use reclaim_cli::domain::error::{ControllerError, GatewayError};
use reclaim_cli::domain::run::Resource;
use reclaim_cli::domain::session::{DestroyReason, Phase, Session, Snapshot};
use reclaim_common::{Mode, RunStatus};

use crate::fakes::{Reply, ScriptedGateway, settings};

fn start(gateway: &Arc<ScriptedGateway>, lifetime_secs: u64) -> ControllerHandle {
    let (handle, _task) = controller::spawn(
        Arc::clone(gateway) as Arc<dyn DispatchGateway>,
        settings(lifetime_secs),
    );
    handle
}

async fn wait_for(handle: &ControllerHandle, predicate: impl FnMut(&Snapshot) -> bool) -> Snapshot {
    let mut rx = handle.subscribe();
    rx.wait_for(predicate).await.expect("controller alive").clone()
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_provision_expire_destroy_round_trip() {
    let gateway = ScriptedGateway::new()
        .provision([
            Reply::Status("queued"),
            Reply::Logs("running", "terraform init"),
            Reply::Logs("applied", "terraform init\nApply complete!"),
        ])
        .destroy([Reply::Status("running"), Reply::Status("destroyed")])
        .into_arc();
    let handle = start(&gateway, 3);

    let run_id = handle.request_provision().await.expect("dispatch accepted");
    let armed = wait_for(&handle, |s| s.phase == Phase::ProvisionedArmed).await;
    assert_eq!(armed.countdown_seconds, Some(3));
    assert!(armed.outputs_visible);
    let run = armed.run.as_ref().expect("current run");
    assert_eq!(run.run_id, run_id);
    assert_eq!(run.status, RunStatus::Applied);
    assert!(run.logs.contains("Apply complete!"));

    let done = wait_for(&handle, |s| s.phase == Phase::Idle).await;
    assert!(done.last_error.is_none(), "unexpected error: {:?}", done.last_error);
    assert!(done.resource.is_none());
    assert!(done.run.is_none());
    assert_eq!(done.destroy_reason, Some(DestroyReason::Expired));

    let dispatches = gateway.dispatches();
    assert_eq!(dispatches.len(), 2);
    assert_eq!(dispatches[0].mode, Mode::Provision);
    assert_eq!(dispatches[0].request_id, run_id);
    assert_eq!(dispatches[1].mode, Mode::Destroy);
    assert_eq!(dispatches[1].state_key, dispatches[0].state_key);
    assert_eq!(dispatches[1].request_id, format!("{run_id}-destroy-1"));
    assert_eq!(
        dispatches[0].state_key,
        format!("multicloud-iac/aws/{run_id}.tfstate")
    );
}

#[tokio::test(start_paused = true)]
async fn test_provision_then_manual_destroy_round_trip() {
    let gateway = ScriptedGateway::new()
        .provision([
            Reply::Status("queued"),
            Reply::Status("in_progress"),
            Reply::Status("applied"),
        ])
        .destroy([Reply::Status("in_progress"), Reply::Status("destroyed")])
        .into_arc();
    let handle = start(&gateway, 120);

    let run_id = handle.request_provision().await.expect("dispatch accepted");
    let armed = wait_for(&handle, |s| s.phase == Phase::ProvisionedArmed).await;
    assert_eq!(armed.countdown_seconds, Some(120));

    handle
        .request_destroy(DestroyReason::Manual)
        .await
        .expect("destroy dispatched");
    let destroying = wait_for(&handle, |s| {
        s.run.as_ref().is_some_and(|run| run.action == Mode::Destroy)
    })
    .await;
    assert!(destroying.countdown_seconds.is_none());

    let done = wait_for(&handle, |s| s.phase == Phase::Idle).await;
    assert!(done.last_error.is_none(), "unexpected error: {:?}", done.last_error);
    assert!(done.run.is_none());
    assert!(done.countdown_seconds.is_none());
    assert!(done.resource.is_none());
    assert_eq!(done.destroy_reason, Some(DestroyReason::Manual));

    let dispatches = gateway.dispatches();
    assert_eq!(dispatches.len(), 2);
    assert_eq!(dispatches[1].mode, Mode::Destroy);
    assert_eq!(dispatches[1].request_id, format!("{run_id}-destroy-1"));
    assert_eq!(dispatches[1].state_key, dispatches[0].state_key);
}

#[tokio::test(start_paused = true)]
async fn test_polling_stops_once_idle() {
    let gateway = ScriptedGateway::new()
        .provision([Reply::Status("applied")])
        .destroy([Reply::Status("destroyed")])
        .into_arc();
    let handle = start(&gateway, 1);

    handle.request_provision().await.unwrap();
    wait_for(&handle, |s| s.phase == Phase::Idle && s.destroy_reason.is_some()).await;
    let calls = gateway.status_calls();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(gateway.status_calls(), calls, "poller kept running after idle");
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_are_retried_until_a_report_arrives() {
    let gateway = ScriptedGateway::new()
        .provision([
            Reply::Unreachable,
            Reply::NotFound,
            Reply::Unreachable,
            Reply::Status("applied"),
        ])
        .into_arc();
    let handle = start(&gateway, 120);

    handle.request_provision().await.unwrap();
    let armed = wait_for(&handle, |s| s.phase == Phase::ProvisionedArmed).await;
    assert!(armed.last_error.is_none());
    assert_eq!(gateway.status_calls(), 4);
}

// ---------------------------------------------------------------------------
// Dispatch failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_provision_dispatch_timeout_leaves_controller_idle() {
    let gateway = ScriptedGateway::new()
        .fail_dispatches([GatewayError::Timeout])
        .into_arc();
    let handle = start(&gateway, 120);

    let err = handle.request_provision().await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Dispatch {
            action: Mode::Provision,
            ..
        }
    ));

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.run.is_none());
    assert!(snapshot.resource.is_none());
    assert!(snapshot.last_error.is_some());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(gateway.status_calls(), 0, "no poll loop after a failed dispatch");
}

#[tokio::test(start_paused = true)]
async fn test_provision_can_be_retried_after_dispatch_failure() {
    let gateway = ScriptedGateway::new()
        .fail_dispatches([GatewayError::Rejected {
            status: 502,
            message: "Failed to dispatch workflow".to_string(),
        }])
        .provision([Reply::Status("queued")])
        .into_arc();
    let handle = start(&gateway, 120);

    assert!(handle.request_provision().await.is_err());
    let run_id = handle.request_provision().await.expect("second attempt");
    let polling = wait_for(&handle, |s| s.phase == Phase::Polling).await;
    assert_eq!(polling.run.map(|r| r.run_id), Some(run_id));
    assert!(polling.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_destroy_dispatch_keeps_the_resource() {
    let gateway = ScriptedGateway::new()
        .fail_dispatches([GatewayError::Timeout])
        .into_arc();
    let session = Session::with_resource(
        settings(600).session,
        Resource {
            run_id: "abc".to_string(),
            state_key: "multicloud-iac/aws/abc.tfstate".to_string(),
            region: "us-east-2".to_string(),
        },
    );
    let (handle, _task) = controller::spawn_with_session(
        Arc::clone(&gateway) as Arc<dyn DispatchGateway>,
        settings(600),
        session,
    );

    let err = handle.request_destroy(DestroyReason::Manual).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Dispatch {
            action: Mode::Destroy,
            ..
        }
    ));
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.resource.is_some(), "resource must survive for a retry");
    assert_eq!(gateway.dispatches()[0].request_id, "abc-destroy-1");
}

// ---------------------------------------------------------------------------
// Rejected requests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_second_provision_is_rejected_while_polling() {
    let gateway = ScriptedGateway::new()
        .provision([Reply::Status("queued")])
        .into_arc();
    let handle = start(&gateway, 120);

    handle.request_provision().await.unwrap();
    let err = handle.request_provision().await.unwrap_err();
    assert_eq!(err, ControllerError::Busy { phase: Phase::Polling });
    assert_eq!(gateway.dispatches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_with_nothing_provisioned_dispatches_nothing() {
    let gateway = ScriptedGateway::new().into_arc();
    let handle = start(&gateway, 120);

    let err = handle.request_destroy(DestroyReason::Manual).await.unwrap_err();
    assert_eq!(err, ControllerError::NoActiveResource);
    assert!(gateway.dispatches().is_empty());
    assert_eq!(gateway.status_calls(), 0);
}

// ---------------------------------------------------------------------------
// Remote outcomes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_failed_provision_runs_end_idle_with_error() {
    for status in ["failed", "errored", "cancelled"] {
        let gateway = ScriptedGateway::new()
            .provision([Reply::Status("running"), Reply::Status(status)])
            .into_arc();
        let handle = start(&gateway, 120);

        handle.request_provision().await.unwrap();
        let done = wait_for(&handle, |s| s.phase == Phase::Idle && s.last_error.is_some()).await;
        assert!(done.countdown_seconds.is_none(), "{status}: countdown armed");
        assert!(!done.outputs_visible);
        assert!(
            done.last_error.as_deref().is_some_and(|e| e.contains(status)),
            "{status}: {:?}",
            done.last_error
        );
        assert_eq!(gateway.dispatches_of(Mode::Destroy).len(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_terminal_statuses_never_arm() {
    let gateway = ScriptedGateway::new()
        .provision([
            Reply::Status("queued"),
            Reply::Status("running"),
            Reply::Status("in_progress"),
            Reply::Status("waiting_for_runner"),
        ])
        .into_arc();
    let handle = start(&gateway, 1);

    handle.request_provision().await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Polling);
    assert!(snapshot.countdown_seconds.is_none());
    assert_eq!(gateway.dispatches().len(), 1);
    assert!(gateway.status_calls() > 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_destroy_run_keeps_the_resource() {
    let gateway = ScriptedGateway::new()
        .provision([Reply::Status("applied")])
        .destroy([Reply::Status("failed")])
        .into_arc();
    let handle = start(&gateway, 1);

    handle.request_provision().await.unwrap();
    let done = wait_for(&handle, |s| {
        s.phase == Phase::Idle && s.last_error.is_some()
    })
    .await;
    assert!(done.resource.is_some());
    assert_eq!(gateway.dispatches_of(Mode::Destroy).len(), 1);

    // A manual retry targets the same state with a fresh destroy id.
    handle.request_destroy(DestroyReason::Manual).await.unwrap();
    let retry = gateway.dispatches_of(Mode::Destroy);
    assert_eq!(retry.len(), 2);
    assert_eq!(retry[0].state_key, retry[1].state_key);
    assert_ne!(retry[0].request_id, retry[1].request_id);
}
