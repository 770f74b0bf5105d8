//! Relay Server Binary
//!
//! Runs the Keyward relay over HTTP with in-memory storage.

use std::env;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use keyward_relay::{create_router, AppState, MemoryBlockStore, Relay, RelayConfig};

#[tokio::main]
async fn main() {
    // Initialize logging
    let log_level = env::var("KEYWARD_RELAY_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Configuration
    let port: u16 = env::var("KEYWARD_RELAY_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .expect("KEYWARD_RELAY_PORT must be a valid port number");

    let config = RelayConfig::from_env();
    let store: Arc<dyn keyward_relay::BlockStore> = Arc::new(MemoryBlockStore::new());

    info!(
        port = port,
        page_size = config.page_size,
        "Starting Keyward relay"
    );

    let state = Arc::new(AppState {
        relay: Relay::new(store, config),
    });
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Relay listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
