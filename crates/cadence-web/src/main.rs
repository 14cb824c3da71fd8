//! cadence-web: Axum server for reply planning, schedule computation and
//! live reveal playback over WebSocket.

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use cadence_core::config::Config;

use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = Config::load_or_default(&project_root)?;

    let port = config.port;
    let addr = format!("0.0.0.0:{}", port);
    info!(
        humanlike_delay = config.bot.humanlike_delay,
        chunk_messages = config.bot.chunk_messages,
        "Loaded delay profile"
    );

    let app = server::router(Arc::new(AppState { config }));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    eprintln!("\n  cadence-web listening on http://localhost:{}\n", port);

    // Graceful shutdown on Ctrl+C
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    info!("Server stopped.");
    Ok(())
}
