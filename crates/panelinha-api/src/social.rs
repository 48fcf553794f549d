use axum::{
    Extension, Json,
    extract::{Path, State},
};
use panelinha_types::api::{LikeResponse, SaveResponse};
use tracing::debug;

use crate::error::AppError;
use crate::middleware::Identity;
use crate::state::{AppState, run_db};
use crate::views;

/// Only recipes the caller can see may be liked or saved.
async fn ensure_visible(state: &AppState, recipe_id: i64, user_id: i64) -> Result<(), AppError> {
    let row = run_db(state, move |db| db.get_recipe(recipe_id)).await?;
    match row {
        Some(row) if views::visible_to(&row, Some(user_id)) => Ok(()),
        _ => Err(AppError::NotFound),
    }
}

/// POST /like/{id}: toggle; answers the new state and like count.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(recipe_id): Path<i64>,
) -> Result<Json<LikeResponse>, AppError> {
    ensure_visible(&state, recipe_id, identity.user_id).await?;

    let user_id = identity.user_id;
    let (liked, like_count) = run_db(&state, move |db| db.toggle_like(user_id, recipe_id)).await?;
    debug!("User {} liked={} recipe {}", identity.username, liked, recipe_id);

    Ok(Json(LikeResponse { liked, like_count }))
}

/// POST /save/{id}: toggle the bookmark; answers the new state and save count.
pub async fn toggle_save(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(recipe_id): Path<i64>,
) -> Result<Json<SaveResponse>, AppError> {
    ensure_visible(&state, recipe_id, identity.user_id).await?;

    let user_id = identity.user_id;
    let (saved, saved_count) = run_db(&state, move |db| db.toggle_save(user_id, recipe_id)).await?;
    debug!("User {} saved={} recipe {}", identity.username, saved, recipe_id);

    Ok(Json(SaveResponse { saved, saved_count }))
}
