use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

mod config;
mod handlers;
mod heartbeat;
mod lock_file;
mod metrics;
mod models;
mod rate_limit;
mod state;
mod worker;

use config::{Args, GateConfig};
use handlers::{health_handler, metrics_handler, pong_handler};
use rate_limit::FileLockGate;
use state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() {
    // parse cli arguments
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // resolve the gate configuration once and create the shared lock file
    let gate_config = GateConfig::resolve(&args);
    lock_file::init_lock_file(&gate_config.lock_path);
    let lock_path = gate_config.lock_path.clone();
    let gate = Arc::new(FileLockGate::new(gate_config));

    let (outcome_tx, outcome_rx) = mpsc::channel(100);

    // creating shared state for the pong side
    let app_state = Arc::new(AppState {
        throttle: DashMap::new(),
        pong_rate_limit: args.pong_rate_limit,
        pong_rate_window: Duration::from_secs(args.pong_rate_window),
    });

    // spawn the background workers
    tokio::spawn(worker::outcome_worker(outcome_rx));

    let topic = format!("{}{}", models::TOPIC_PREFIX, args.port);
    tokio::spawn(heartbeat::heartbeat_loop(
        gate,
        reqwest::Client::new(),
        args.pong_url.clone(),
        args.heartbeat_interval,
        topic,
        outcome_tx,
    ));

    // creating the router with routes
    let app = Router::new()
        .route("/pong", post(pong_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler)) // metrics endpoint
        .with_state(app_state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    println!("Pong endpoint on http://localhost:{}/pong", args.port);
    println!("Heartbeat target: {}", args.pong_url);
    println!("Shared lock file: {}", lock_path.display());
    println!(
        "Rate limit: {} retained entries, {} ms window",
        args.rate_limit_num, args.rate_limit_threshold
    );
    axum::serve(listener, app).await.unwrap();
}
