//! Status polling: one query, or a loop of them on a fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::ports::DispatchGateway;
use crate::domain::error::GatewayError;
use crate::domain::session::{Event, Observation};

/// Error statuses a later poll can still get past: throttling and the
/// proxy-level 502/503/504.
fn is_retryable(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// Query the status of `run_id` once.
pub async fn poll_once(gateway: &dyn DispatchGateway, run_id: &str) -> Observation {
    match gateway.status(run_id).await {
        Ok(Some(response)) => Observation::Reported {
            status: response.status,
            logs: response.logs,
        },
        Ok(None) => Observation::NotRecorded,
        Err(GatewayError::Rejected { status, message }) if !is_retryable(status) => {
            tracing::error!(run_id, status, error = %message, "status query rejected");
            Observation::Rejected { status, message }
        }
        Err(err) => {
            tracing::warn!(run_id, error = %err, "status poll failed");
            Observation::Unreachable(err.to_string())
        }
    }
}

/// Poll `run_id` every `every`, starting immediately, until the receiver goes
/// away or the task is aborted.
pub fn spawn_poller(
    gateway: Arc<dyn DispatchGateway>,
    run_id: String,
    every: Duration,
    events: mpsc::Sender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let observation = poll_once(gateway.as_ref(), &run_id).await;
            let event = Event::PollObserved {
                run_id: run_id.clone(),
                observation,
            };
            if events.send(event).await.is_err() {
                return;
            }
        }
    })
}
