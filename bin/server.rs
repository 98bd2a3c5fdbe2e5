// Fee Ledger - Server
// Long-lived peer: serves GET/POST /db for sync plus the JSON API.

use anyhow::{Context, Result};
use fee_ledger::sync::server::spawn_server;
use fee_ledger::{api, logging, sync, Config, Store};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    logging::init(&config.log_filter);

    tracing::info!("Fee Ledger server starting");

    let store = Store::open(&config.store_path)?;
    tracing::info!(store = ?store.path(), "store opened");

    let app = api::router(store.clone())
        .merge(sync::sync_router(store, config.max_snapshot_bytes));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    let token = CancellationToken::new();
    let handle = spawn_server(listener, app, token.clone())?;

    println!("\n🚀 Server running on http://{}", handle.local_addr());
    println!("   Sync: GET/POST /db");
    println!("   API:  /api/persons");
    println!("\n   Press Ctrl+C to stop\n");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("shutdown requested");
    token.cancel();

    handle.wait().await.context("Server exited with error")?;
    Ok(())
}
