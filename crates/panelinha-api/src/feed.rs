use axum::{
    Extension, Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use panelinha_types::api::{FeedQuery, FeedResponse, Landing, Page, RecipeCard, SearchQuery};

use crate::auth::HOME;
use crate::error::AppError;
use crate::middleware::{CurrentUser, Identity};
use crate::state::{AppState, run_db};
use crate::views;

pub const SEARCH_PAGE_SIZE: u32 = 12;

/// GET / and /index: signed-in users go straight to their feed.
pub async fn index(Extension(current): Extension<CurrentUser>) -> Response {
    if current.is_authenticated() {
        return Redirect::to(HOME).into_response();
    }
    Json(Landing {
        app: "Panelinha Social",
        authenticated: false,
    })
    .into_response()
}

/// GET /feed?sort=recent|popular|views
pub async fn feed(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let sort = query.sort_key();
    let viewer = identity.user_id;

    let items = run_db(&state, move |db| {
        let rows = db.list_published(sort)?;
        views::cards(db, rows, Some(viewer))
    })
    .await?;

    Ok(Json(FeedResponse { sort, items }))
}

/// GET /search?q=&difficulty=&page=
pub async fn search(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<RecipeCard>>, AppError> {
    let text = query.text().map(str::to_string);
    let difficulty = query.difficulty().map(str::to_string);
    let page = query.page();
    let offset = (page - 1).saturating_mul(SEARCH_PAGE_SIZE);
    let viewer = current.id();

    let (items, total) = run_db(&state, move |db| {
        let (rows, total) =
            db.search_published(text.as_deref(), difficulty.as_deref(), SEARCH_PAGE_SIZE, offset)?;
        Ok((views::cards(db, rows, viewer)?, total))
    })
    .await?;

    Ok(Json(Page::new(items, page, SEARCH_PAGE_SIZE, total)))
}

/// GET /my_recipes: own recipes, drafts included.
pub async fn my_recipes(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<RecipeCard>>, AppError> {
    let me = identity.user_id;
    let items = run_db(&state, move |db| {
        let rows = db.list_by_user(me, true)?;
        views::cards(db, rows, Some(me))
    })
    .await?;
    Ok(Json(items))
}

/// GET /saved_recipes: bookmarks, most recently saved first.
pub async fn saved_recipes(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<RecipeCard>>, AppError> {
    let me = identity.user_id;
    let items = run_db(&state, move |db| {
        let rows = db.list_saved(me)?;
        views::cards(db, rows, Some(me))
    })
    .await?;
    Ok(Json(items))
}
