use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;

use crate::lock_file;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "ping-pong-gateway")]
#[command(about = "Heartbeat sender with a file-lock rate limit shared across local processes")]
pub struct Args {
    // Port to serve /pong, /health and /metrics on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Base URL of the pong endpoint the heartbeat posts to
    #[arg(long, default_value = "http://localhost:8080")]
    pub pong_url: String,

    // Heartbeat interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub heartbeat_interval: u64,

    // Sliding window length in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub rate_limit_threshold: i64,

    // Max timestamp entries retained in the lock file (must be >= 2)
    #[arg(long, default_value_t = 2)]
    pub rate_limit_num: usize,

    // Max lock acquisition attempts per check
    #[arg(long, default_value_t = 3)]
    pub lock_retry_times: u32,

    // Delay between lock acquisition attempts in milliseconds
    #[arg(long, default_value_t = 100)]
    pub lock_retry_delay: u64,

    // Lock file location; defaults to the platform path
    #[arg(long)]
    pub lock_path: Option<PathBuf>,

    // Pong-side throttle: max requests per window
    #[arg(long, default_value_t = 10)]
    pub pong_rate_limit: u32,

    // Pong-side throttle window in seconds
    #[arg(long, default_value_t = 60)]
    pub pong_rate_window: u64,
}

// Everything the admission gate needs, resolved once at startup and passed
// down explicitly.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub lock_path: PathBuf,
    pub threshold_ms: i64,
    pub retention: usize,
    pub lock_retry_times: u32,
    pub lock_retry_delay: Duration,
    // Decimal width of an epoch-millis timestamp, measured once here and
    // never re-measured per value
    pub timestamp_width: usize,
}

impl GateConfig {
    pub fn resolve(args: &Args) -> Self {
        Self {
            lock_path: args.lock_path.clone().unwrap_or_else(lock_file::default_lock_path),
            threshold_ms: args.rate_limit_threshold,
            retention: args.rate_limit_num,
            lock_retry_times: args.lock_retry_times,
            lock_retry_delay: Duration::from_millis(args.lock_retry_delay),
            timestamp_width: Utc::now().timestamp_millis().to_string().len(),
        }
    }
}
