use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{load_identity, require_auth};
use crate::state::AppState;
use crate::{auth, comments, feed, profile, recipes, social};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(feed::index))
        .route("/index", get(feed::index))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/search", get(feed::search))
        .route("/recipe/{id}", get(recipes::recipe_detail).post(comments::add_comment))
        .route("/user/{username}", get(profile::user_profile));

    let protected_routes = Router::new()
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/feed", get(feed::feed))
        .route("/my_recipes", get(feed::my_recipes))
        .route("/saved_recipes", get(feed::saved_recipes))
        .route("/recipe/new", get(recipes::new_recipe_page).post(recipes::create_recipe))
        .route("/recipe/{id}/edit", get(recipes::edit_recipe_page).post(recipes::update_recipe))
        .route("/recipe/{id}/delete", post(recipes::delete_recipe))
        .route("/comment/{id}/delete", post(comments::delete_comment))
        .route("/like/{id}", post(social::toggle_like))
        .route("/save/{id}", post(social::toggle_save))
        .route("/profile/edit", get(profile::edit_profile_page).post(profile::update_profile))
        .route(
            "/change_password",
            get(profile::change_password_page).post(profile::change_password),
        )
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(state.storage.dir()))
        .layer(middleware::from_fn_with_state(state.clone(), load_identity))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
