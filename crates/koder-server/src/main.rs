//! koder-server - Koder remote tier
//!
//! Serves the blob, document and search API used by `HttpRemote`, backed by
//! a single SQLite database.

use koder_core::remote::SqliteRemote;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod middleware;
mod routes;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("koder_server=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("koder-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load()?;
    info!("Database at {}", config.database_path.display());
    if config.token.is_none() {
        info!("No KODER_SERVER_TOKEN set; /api routes are unauthenticated");
    }

    let store = SqliteRemote::open(&config.database_path)?;
    let addr = config.addr;
    let app = routes::create_router(state::AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
