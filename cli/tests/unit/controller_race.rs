//! Countdown expiry and a manual destroy arriving together must yield one
//! destroy dispatch, whichever the controller sees first.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use reclaim_cli::application::ports::DispatchGateway;
use reclaim_cli::application::services::controller::{self, ControllerHandle};
use reclaim_cli::domain::session::{DestroyReason, Phase};
use reclaim_common::Mode;

use crate::fakes::{Reply, ScriptedGateway, settings};

async fn armed(gateway: &Arc<ScriptedGateway>, lifetime_secs: u64) -> ControllerHandle {
    let (handle, _task) = controller::spawn(
        Arc::clone(gateway) as Arc<dyn DispatchGateway>,
        settings(lifetime_secs),
    );
    handle.request_provision().await.expect("provision accepted");
    handle
        .subscribe()
        .wait_for(|s| s.phase == Phase::ProvisionedArmed)
        .await
        .expect("controller alive");
    handle
}

async fn settled(handle: &ControllerHandle) {
    handle
        .subscribe()
        .wait_for(|s| s.phase == Phase::Idle)
        .await
        .expect("controller alive");
}

#[tokio::test(start_paused = true)]
async fn test_manual_destroy_at_expiry_dispatches_once() {
    let gateway = ScriptedGateway::new()
        .provision([Reply::Status("applied")])
        .destroy([Reply::Status("running"), Reply::Status("destroyed")])
        .into_arc();
    let handle = armed(&gateway, 1).await;

    // Wake exactly when the countdown fires.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let manual = handle.request_destroy(DestroyReason::Manual).await;
    assert!(manual.is_ok(), "a destroy already under way is a no-op: {manual:?}");

    settled(&handle).await;
    assert_eq!(gateway.dispatches_of(Mode::Destroy).len(), 1);
    assert!(handle.snapshot().last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_manual_destroys_dispatch_once() {
    let gateway = ScriptedGateway::new()
        .provision([Reply::Status("applied")])
        .destroy([Reply::Status("destroyed")])
        .into_arc();
    let handle = armed(&gateway, 60).await;

    let first = handle.clone();
    let second = handle.clone();
    let (a, b) = tokio::join!(
        first.request_destroy(DestroyReason::Manual),
        second.request_destroy(DestroyReason::Manual),
    );
    assert!(a.is_ok() && b.is_ok(), "{a:?} {b:?}");

    settled(&handle).await;
    assert_eq!(gateway.dispatches_of(Mode::Destroy).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_destroy_during_slow_expiry_dispatch_is_a_noop() {
    let gateway = ScriptedGateway::new()
        .provision([Reply::Status("applied")])
        .destroy([Reply::Status("destroyed")])
        .dispatch_delay(Duration::from_secs(2))
        .into_arc();
    let (handle, _task) = controller::spawn(
        Arc::clone(&gateway) as Arc<dyn DispatchGateway>,
        settings(1),
    );
    handle.request_provision().await.unwrap();

    // Provision is accepted at t=2s and armed by the first poll. The expiry
    // dispatch starts at t=3s and is still in flight at t=4.5s.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(handle.snapshot().phase, Phase::Destroying);
    handle.request_destroy(DestroyReason::Manual).await.unwrap();

    settled(&handle).await;
    let destroys = gateway.dispatches_of(Mode::Destroy);
    assert_eq!(destroys.len(), 1);
    assert_eq!(handle.snapshot().destroy_reason, Some(DestroyReason::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_expiry_after_manual_destroy_is_ignored() {
    let gateway = ScriptedGateway::new()
        .provision([Reply::Status("applied")])
        .destroy([Reply::Status("running")])
        .into_arc();
    let handle = armed(&gateway, 3).await;

    handle.request_destroy(DestroyReason::Manual).await.unwrap();
    // Well past the original expiry; the destroy run is still polling.
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Polling);
    assert!(snapshot.countdown_seconds.is_none());
    assert_eq!(snapshot.destroy_reason, Some(DestroyReason::Manual));
    assert_eq!(gateway.dispatches_of(Mode::Destroy).len(), 1);
}
