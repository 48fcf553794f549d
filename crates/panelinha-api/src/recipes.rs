use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use panelinha_db::models::{RecipeFields, RecipeRow};
use panelinha_types::api::{FormPage, RecipeDetail, RecipeForm};
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::forms;
use crate::middleware::{CurrentUser, Identity};
use crate::multipart::Submission;
use crate::state::{AppState, run_db};
use crate::views;

const NOT_OWNER_EDIT: &str = "You can only edit your own recipes.";
const NOT_OWNER_DELETE: &str = "You can only delete your own recipes.";

pub fn recipe_url(id: i64) -> String {
    format!("/recipe/{}", id)
}

/// GET /recipe/new
pub async fn new_recipe_page() -> Json<FormPage> {
    Json(FormPage {
        form: "recipe",
        values: json!(RecipeForm::default()),
    })
}

/// POST /recipe/new: multipart form, optional `image` file.
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let submission = Submission::read(multipart).await?;
    let fields = forms::validate_recipe(&submission.recipe_form(), submission.file_name("image"))?;

    let image = match submission.file("image") {
        Some(file) => Some(state.storage.save(&file.filename, &file.data).await?),
        None => None,
    };

    let owner = identity.user_id;
    let is_draft = fields.is_draft;
    let stored = image.clone();
    let inserted = run_db(&state, move |db| db.insert_recipe(owner, &fields, stored.as_deref())).await;
    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            state.storage.discard(image.as_deref()).await;
            return Err(e);
        }
    };

    info!("User {} created recipe {} (draft: {})", identity.username, id, is_draft);
    let target = if is_draft { "/my_recipes".to_string() } else { recipe_url(id) };
    Ok(Redirect::to(&target).into_response())
}

/// GET /recipe/{id}: counts one view per request, whoever asks.
pub async fn recipe_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, AppError> {
    let viewer = current.id();

    let detail = run_db(&state, move |db| {
        match db.get_recipe(id)? {
            Some(row) if views::visible_to(&row, viewer) => {}
            _ => return Ok(None),
        }

        db.increment_views(id)?;
        let Some(row) = db.get_recipe(id)? else {
            return Ok(None);
        };

        let owner = row.user_id;
        let ingredients = row.ingredients.clone();
        let steps = row.steps.clone();
        let comments: Vec<_> = db
            .list_comments(id)?
            .into_iter()
            .map(|c| views::comment_view(c, viewer, owner))
            .collect();
        let card = views::cards(db, vec![row], viewer)?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("card for recipe {} vanished", id))?;

        Ok(Some(RecipeDetail {
            card,
            ingredients,
            steps,
            is_owner: viewer == Some(owner),
            comments,
        }))
    })
    .await?;

    detail.map(Json).ok_or(AppError::NotFound)
}

/// GET /recipe/{id}/edit
pub async fn edit_recipe_page(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<FormPage>, AppError> {
    let row = owned_recipe(&state, id, identity.user_id, NOT_OWNER_EDIT).await?;
    let values = RecipeForm {
        title: row.title,
        description: row.description,
        ingredients: row.ingredients,
        steps: row.steps,
        categories: row.categories.unwrap_or_default(),
        difficulty: row.difficulty.unwrap_or_default(),
        is_draft: row.is_draft,
    };
    Ok(Json(FormPage {
        form: "recipe",
        values: json!({ "recipe": values, "image": row.image }),
    }))
}

/// POST /recipe/{id}/edit: a new image replaces (and deletes) the old one.
pub async fn update_recipe(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let existing = owned_recipe(&state, id, identity.user_id, NOT_OWNER_EDIT).await?;

    let submission = Submission::read(multipart).await?;
    let fields: RecipeFields =
        forms::validate_recipe(&submission.recipe_form(), submission.file_name("image"))?;

    // The new file is written before the old one goes, so a failure in
    // between leaves an orphan file rather than a dangling reference.
    let new_image = match submission.file("image") {
        Some(file) => Some(state.storage.save(&file.filename, &file.data).await?),
        None => None,
    };
    let image = new_image.clone().or(existing.image.clone());

    let owner = identity.user_id;
    let updated = run_db(&state, move |db| db.update_recipe(id, owner, &fields, image.as_deref())).await;
    match updated {
        Ok(true) => {}
        Ok(false) => {
            state.storage.discard(new_image.as_deref()).await;
            return Err(AppError::NotFound);
        }
        Err(e) => {
            state.storage.discard(new_image.as_deref()).await;
            return Err(e);
        }
    }

    if new_image.is_some() {
        state.storage.discard(existing.image.as_deref()).await;
    }

    info!("User {} updated recipe {}", identity.username, id);
    Ok(Redirect::to(&recipe_url(id)).into_response())
}

/// POST /recipe/{id}/delete: rows cascade, then the image file goes.
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    owned_recipe(&state, id, identity.user_id, NOT_OWNER_DELETE).await?;

    let owner = identity.user_id;
    let removed = run_db(&state, move |db| db.delete_recipe(id, owner))
        .await?
        .ok_or(AppError::NotFound)?;

    state.storage.discard(removed.image.as_deref()).await;

    info!("User {} deleted recipe {}", identity.username, id);
    Ok(Redirect::to("/my_recipes").into_response())
}

/// Fetch a recipe the caller must own. Someone else's recipe is Forbidden
/// (flash + redirect back to it); a missing one is NotFound.
async fn owned_recipe(state: &AppState, id: i64, user_id: i64, message: &str) -> Result<RecipeRow, AppError> {
    let row = run_db(state, move |db| db.get_recipe(id))
        .await?
        .ok_or(AppError::NotFound)?;
    if row.user_id != user_id {
        let target = if row.is_draft { "/feed".to_string() } else { recipe_url(id) };
        return Err(AppError::forbidden(message, target));
    }
    Ok(row)
}
