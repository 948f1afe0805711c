mod health;
mod metrics;
mod pong;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use pong::pong_handler;
