use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};

lazy_static! {
    pub static ref HEARTBEATS_TOTAL: Counter =
        register_counter!("ping_heartbeats_total", "Total number of heartbeat ticks").unwrap();
    pub static ref PONG_REPLIES: Counter =
        register_counter!("ping_pong_replies_total", "Heartbeats answered by pong").unwrap();
    pub static ref PONG_THROTTLED: Counter =
        register_counter!("ping_pong_throttled_total", "Heartbeats throttled downstream or lock-starved").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("ping_rate_limited_total", "Heartbeats held back by the shared window").unwrap();
    pub static ref PONG_REQUESTS: Counter =
        register_counter!("pong_requests_total", "Total requests to /pong").unwrap();
    pub static ref HEARTBEAT_LATENCY: Histogram = register_histogram!(
        "ping_heartbeat_latency_seconds",
        "Heartbeat round trip latency in seconds"
    )
    .unwrap();
}
