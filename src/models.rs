use serde::Serialize;

// Topic naming keeps one stream per heartbeat process, keyed by its port
pub const TOPIC_PREFIX: &str = "topic_ping_pong_";

// How a single heartbeat tick ended. LockUnavailable on the gate side maps
// to PongThrottled here, the same degraded outcome as a 429 from pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeartbeatOutcome {
    PongReplied,
    PongThrottled,
    RateLimited,
}

impl HeartbeatOutcome {
    pub fn log_line(self) -> &'static str {
        match self {
            HeartbeatOutcome::PongReplied => "Request sent & Pong Respond.",
            HeartbeatOutcome::PongThrottled => "Request send & Pong throttled it.",
            HeartbeatOutcome::RateLimited => "Request not send as being \"rate limited\".",
        }
    }
}

// One record per heartbeat tick, queued for the outcome recorder
#[derive(Debug, Serialize)]
pub struct OutcomeRecord {
    pub topic: String,
    pub outcome: HeartbeatOutcome,
}
