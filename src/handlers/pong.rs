use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::PONG_REQUESTS;
use crate::state::{AppState, ThrottleEntry};

// Throttle check function - fixed window per caller key
fn check_throttle(state: &AppState, key: &str) -> bool {
    let now = Instant::now();

    let mut entry = state
        .throttle
        .entry(key.to_string())
        .or_insert(ThrottleEntry {
            count: 0,
            window_start: now,
        });

    if entry.window_start.elapsed() > state.pong_rate_window {
        entry.count = 1;
        entry.window_start = now;
        return true;
    }

    if entry.count < state.pong_rate_limit {
        entry.count += 1;
        return true;
    }

    false
}

// Heartbeat target. Replies "World" unless the caller is over the
// per-window request cap, in which case it answers 429 and the heartbeat
// records a throttled outcome.
pub async fn pong_handler(State(state): State<Arc<AppState>>, _body: String) -> Response {
    PONG_REQUESTS.inc();

    if !check_throttle(&state, "global") {
        return (StatusCode::TOO_MANY_REQUESTS, "Too many heartbeats. Try again later.").into_response();
    }

    "World".into_response()
}
