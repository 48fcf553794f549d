mod config;

use std::net::SocketAddr;

use tracing::{info, warn};

use panelinha_api::storage::ImageStore;
use panelinha_api::{AppStateInner, router};
use panelinha_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "panelinha=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    match db.prune_expired_sessions() {
        Ok(0) => {}
        Ok(n) => info!("Pruned {} expired sessions", n),
        Err(e) => warn!("Could not prune sessions: {}", e),
    }

    let storage = ImageStore::new(config.upload_dir.clone()).await?;
    let state = AppStateInner::new(db, storage, config.secret_key.clone(), config.max_upload_bytes);
    let app = router(state);

    let addr: SocketAddr = config.addr().parse()?;
    info!("Panelinha Social listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            warn!("Failed to install SIGTERM handler, only Ctrl+C will stop the server");
            ctrl_c.await.ok();
            return;
        };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
