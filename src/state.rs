use dashmap::DashMap;
use std::time::{Duration, Instant};

// Pong-side throttle entry - tracks requests per caller key
pub struct ThrottleEntry {
    pub count: u32,
    pub window_start: Instant,
}

// Shared state for the pong endpoint
pub struct AppState {
    pub throttle: DashMap<String, ThrottleEntry>,
    pub pong_rate_limit: u32,      // max requests allowed
    pub pong_rate_window: Duration, // duration of the throttle window
}
