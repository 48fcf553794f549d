use axum::{
    Extension, Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use panelinha_types::api::CommentForm;
use tracing::info;

use crate::error::AppError;
use crate::forms;
use crate::middleware::{CurrentUser, Identity};
use crate::recipes::recipe_url;
use crate::state::{AppState, run_db};
use crate::views;

/// POST /recipe/{id}: add a comment. The page itself is public, so the login
/// check happens here rather than in the route layer.
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let Some(identity) = current.0 else {
        return Err(AppError::Unauthorized { next: recipe_url(id) });
    };

    let recipe = run_db(&state, move |db| db.get_recipe(id)).await?;
    match recipe {
        Some(row) if views::visible_to(&row, Some(identity.user_id)) => {}
        _ => return Err(AppError::NotFound),
    }

    let content = forms::validate_comment(&form)?;
    let author = identity.user_id;
    let comment_id = run_db(&state, move |db| db.insert_comment(id, author, &content)).await?;

    info!("User {} commented on recipe {} ({})", identity.username, id, comment_id);
    Ok(Redirect::to(&format!("{}#comments", recipe_url(id))).into_response())
}

/// POST /comment/{id}/delete: allowed to the comment's author and to the
/// owner of the recipe it sits on.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let me = identity.user_id;

    let (comment, recipe) = run_db(&state, move |db| {
        let Some(comment) = db.get_comment(id)? else {
            return Ok(None);
        };
        let recipe = db.get_recipe(comment.recipe_id)?;
        Ok(recipe.map(|r| (comment, r)))
    })
    .await?
    .ok_or(AppError::NotFound)?;

    let back = recipe_url(recipe.id);
    if me != comment.user_id && me != recipe.user_id {
        return Err(AppError::forbidden("You cannot delete this comment.", back));
    }

    run_db(&state, move |db| db.delete_comment(id)).await?;
    info!("User {} deleted comment {} on recipe {}", identity.username, id, recipe.id);
    Ok(Redirect::to(&back).into_response())
}
