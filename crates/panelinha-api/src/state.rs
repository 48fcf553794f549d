use std::sync::Arc;

use panelinha_db::Database;
use tracing::error;

use crate::error::AppError;
use crate::storage::ImageStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: ImageStore,
    pub secret_key: String,
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    pub fn new(db: Database, storage: ImageStore, secret_key: String, max_upload_bytes: usize) -> AppState {
        Arc::new(Self {
            db,
            storage,
            secret_key,
            max_upload_bytes,
        })
    }
}

/// Run blocking DB work off the async runtime. The connection guard taken
/// inside `f` is released when the closure returns, on every path.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
        .map_err(AppError::from)
}
