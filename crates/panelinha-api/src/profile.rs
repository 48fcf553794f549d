use axum::{
    Extension, Form, Json,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use panelinha_db::is_constraint_violation;
use panelinha_types::api::{ChangePasswordForm, FormErrors, FormPage, ProfileForm, ProfileView};
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::forms;
use crate::middleware::{CurrentUser, Identity};
use crate::multipart::Submission;
use crate::password::{hash_password, verify_password};
use crate::state::{AppState, run_db};
use crate::views;

fn profile_url(username: &str) -> String {
    format!("/user/{}", urlencoding::encode(username))
}

/// GET /user/{username}: public profile with published recipes only.
pub async fn user_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Json<ProfileView>, AppError> {
    let viewer = current.id();

    let view = run_db(&state, move |db| {
        let Some(user) = db.get_user_by_username(&username)? else {
            return Ok(None);
        };
        let rows = db.list_by_user(user.id, false)?;
        let total_likes = db.likes_received(user.id)?;
        let recipes = views::cards(db, rows, viewer)?;
        Ok(Some(ProfileView {
            user: views::user_view(&user),
            is_self: viewer == Some(user.id),
            recipe_count: recipes.len(),
            total_likes,
            recipes,
        }))
    })
    .await?;

    view.map(Json).ok_or(AppError::NotFound)
}

/// GET /profile/edit
pub async fn edit_profile_page(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<FormPage>, AppError> {
    let me = identity.user_id;
    let user = run_db(&state, move |db| db.get_user_by_id(me))
        .await?
        .ok_or(AppError::NotFound)?;

    let values = ProfileForm {
        username: user.username,
        email: user.email,
        bio: user.bio.unwrap_or_default(),
    };
    Ok(Json(FormPage {
        form: "profile",
        values: json!({ "profile": values, "profile_picture": user.profile_picture }),
    }))
}

/// POST /profile/edit: multipart; `profile_picture` replaces the old file.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let submission = Submission::read(multipart).await?;
    let form = submission.profile_form();
    forms::validate_profile(&form, submission.file_name("profile_picture"))?;

    let me = identity.user_id;
    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    let bio = Some(form.bio.trim().to_string()).filter(|b| !b.is_empty());

    let (lookup_username, lookup_email) = (username.clone(), email.clone());
    let current = run_db(&state, move |db| {
        let mut errors = FormErrors::new();
        if db.username_taken(&lookup_username, Some(me))? {
            errors.add("username", "Username already taken.");
        }
        if db.email_taken(&lookup_email, Some(me))? {
            errors.add("email", "Email already registered.");
        }
        if let Err(errors) = errors.into_result() {
            return Ok(Err(errors));
        }
        Ok(Ok(db.get_user_by_id(me)?))
    })
    .await??
    .ok_or(AppError::NotFound)?;

    let new_picture = match submission.file("profile_picture") {
        Some(file) => Some(state.storage.save(&file.filename, &file.data).await?),
        None => None,
    };
    let picture = new_picture.clone().or(current.profile_picture.clone());

    let saved_username = username.clone();
    let updated = run_db(&state, move |db| {
        match db.update_profile(me, &saved_username, &email, bio.as_deref(), picture.as_deref()) {
            Ok(()) => Ok(Ok(())),
            // Another account grabbed the name between the check and the write.
            Err(e) if is_constraint_violation(&e) => Ok(Err(FormErrors::single(
                "username",
                "Username or email already registered.",
            ))),
            Err(e) => Err(e),
        }
    })
    .await;

    match updated {
        Ok(Ok(())) => {}
        Ok(Err(errors)) => {
            state.storage.discard(new_picture.as_deref()).await;
            return Err(AppError::Validation(errors));
        }
        Err(e) => {
            state.storage.discard(new_picture.as_deref()).await;
            return Err(e);
        }
    }

    if new_picture.is_some() {
        state.storage.discard(current.profile_picture.as_deref()).await;
    }

    info!("User {} updated profile (now {})", identity.username, username);
    Ok(Redirect::to(&profile_url(&username)).into_response())
}

/// GET /change_password
pub async fn change_password_page() -> Json<FormPage> {
    Json(FormPage {
        form: "change_password",
        values: json!({}),
    })
}

/// POST /change_password: other sessions of the user are signed out.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Response, AppError> {
    forms::validate_change_password(&form)?;

    let me = identity.user_id;
    let keep = identity.session_id.to_string();
    run_db(&state, move |db| {
        let user = db
            .get_user_by_id(me)?
            .ok_or_else(|| anyhow::anyhow!("user {} has a session but no row", me))?;
        if !verify_password(&form.current_password, &user.password_hash) {
            return Ok(Err(FormErrors::single(
                "current_password",
                "Current password is incorrect.",
            )));
        }
        db.update_password(me, &hash_password(&form.new_password)?)?;
        db.delete_user_sessions(me, Some(&keep))?;
        Ok(Ok(()))
    })
    .await??;

    info!("User {} changed password", identity.username);
    Ok(Redirect::to(&profile_url(&identity.username)).into_response())
}
