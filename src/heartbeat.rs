use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info};

use crate::metrics::{HEARTBEAT_LATENCY, HEARTBEATS_TOTAL};
use crate::models::{HeartbeatOutcome, OutcomeRecord};
use crate::rate_limit::{Decision, FileLockGate};

enum PingReply {
    Replied(String),
    Throttled,
}

// Heartbeat loop - one admission check per tick, then a ping if admitted.
// The gate does blocking file I/O, so each check runs on the blocking pool;
// the lock is never held across the outbound request.
pub async fn heartbeat_loop(
    gate: Arc<FileLockGate>,
    client: reqwest::Client,
    pong_url: String,
    interval_ms: u64,
    topic: String,
    outcome_tx: mpsc::Sender<OutcomeRecord>,
) {
    println!("Heartbeat started - ticking every {} ms", interval_ms);

    let mut ticker = interval(Duration::from_millis(interval_ms));
    loop {
        ticker.tick().await;
        HEARTBEATS_TOTAL.inc();

        let check_gate = Arc::clone(&gate);
        let decision = match tokio::task::spawn_blocking(move || check_gate.check()).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                error!(error = %e, "admission gate failed, skipping this tick");
                continue;
            }
            Err(e) => {
                error!(error = %e, "admission gate task panicked");
                continue;
            }
        };

        match decision {
            Decision::Admitted => {
                let start = Instant::now();
                match send_ping(&client, &pong_url).await {
                    Ok(PingReply::Replied(body)) => {
                        HEARTBEAT_LATENCY.observe(start.elapsed().as_secs_f64());
                        info!(%body, "pong replied");
                        record(&outcome_tx, &topic, HeartbeatOutcome::PongReplied).await;
                    }
                    Ok(PingReply::Throttled) => {
                        record(&outcome_tx, &topic, HeartbeatOutcome::PongThrottled).await;
                    }
                    Err(e) => {
                        // No outcome for transport or non-429 server errors
                        error!(error = %e, "heartbeat send failed");
                    }
                }
            }
            Decision::RateLimited => {
                record(&outcome_tx, &topic, HeartbeatOutcome::RateLimited).await;
            }
            // Lock starvation counts the same as a throttled send
            Decision::LockUnavailable => {
                record(&outcome_tx, &topic, HeartbeatOutcome::PongThrottled).await;
            }
        }
    }
}

async fn send_ping(client: &reqwest::Client, pong_url: &str) -> Result<PingReply, reqwest::Error> {
    let response = client
        .post(format!("{}/pong", pong_url))
        .body("Hello")
        .send()
        .await?;

    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return Ok(PingReply::Throttled);
    }
    let response = response.error_for_status()?;
    Ok(PingReply::Replied(response.text().await?))
}

async fn record(tx: &mpsc::Sender<OutcomeRecord>, topic: &str, outcome: HeartbeatOutcome) {
    let sent = tx
        .send(OutcomeRecord {
            topic: topic.to_string(),
            outcome,
        })
        .await;
    if sent.is_err() {
        error!("outcome recorder is gone, dropping record");
    }
}
