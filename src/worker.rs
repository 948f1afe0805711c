use tokio::sync::mpsc;
use tracing::info;

use crate::metrics::{PONG_REPLIES, PONG_THROTTLED, RATE_LIMITED};
use crate::models::{HeartbeatOutcome, OutcomeRecord};

// Outcome recorder - drains heartbeat results from the queue one by one,
// keeps the per-outcome counters and emits one log line per tick so the
// three outcomes stay distinguishable downstream.
pub async fn outcome_worker(mut rx: mpsc::Receiver<OutcomeRecord>) {
    println!("Outcome recorder started - draining heartbeat results");

    while let Some(record) = rx.recv().await {
        match record.outcome {
            HeartbeatOutcome::PongReplied => PONG_REPLIES.inc(),
            HeartbeatOutcome::PongThrottled => PONG_THROTTLED.inc(),
            HeartbeatOutcome::RateLimited => RATE_LIMITED.inc(),
        }
        let payload = serde_json::json!({
            "topic": record.topic,
            "outcome": record.outcome,
            "msg": record.outcome.log_line(),
        });
        info!("{payload}");
    }
}
