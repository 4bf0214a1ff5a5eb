//! Tsudoi server: room/channel presence coordinator and WebRTC signaling relay.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsudoi-server
//! cargo run --bin tsudoi-server -- --host 0.0.0.0 --port 3000 --log-level debug
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tsudoi_server::{
    config::ServerConfig,
    ui::{AppState, Server},
};
use tsudoi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "tsudoi-server")]
#[command(about = "Room/channel presence coordinator and signaling relay", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Upper bound for each persistence call, in milliseconds
    #[arg(long, default_value = "5000")]
    store_timeout_ms: u64,

    /// Number of messages returned when joining a text channel
    #[arg(long, default_value = "50")]
    history_limit: usize,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            history_limit: self.history_limit,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = args.server_config();
    tracing::info!(
        store_timeout_ms = args.store_timeout_ms,
        history_limit = config.history_limit,
        "Starting with in-memory store"
    );

    let state = Arc::new(AppState::in_memory(config));
    let server = Server::new(state);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
