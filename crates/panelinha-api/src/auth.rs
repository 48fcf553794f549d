use axum::{
    Extension, Form, Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use panelinha_db::is_constraint_violation;
use panelinha_types::api::{Claims, FormErrors, FormPage, LoginForm, NextQuery, RegisterForm};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::forms;
use crate::middleware::{CurrentUser, Identity, expired_session_cookie, safe_next, session_cookie};
use crate::password::{hash_password, verify_password};
use crate::state::{AppState, run_db};

/// Lifetime of a "remember me" login.
const REMEMBER_TTL_DAYS: i64 = 30;
/// Lifetime of a browser-session login.
const SESSION_TTL_DAYS: i64 = 1;

pub const HOME: &str = "/feed";

pub async fn register_page(Extension(current): Extension<CurrentUser>) -> Response {
    if current.is_authenticated() {
        return Redirect::to(HOME).into_response();
    }
    Json(FormPage { form: "register", values: json!({}) }).into_response()
}

pub async fn register(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<NextQuery>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if current.is_authenticated() {
        return Ok(Redirect::to(HOME).into_response());
    }

    forms::validate_register(&form)?;

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    let password = form.password;

    let user_id = run_db(&state, move |db| {
        let mut errors = FormErrors::new();
        if db.username_taken(&username, None)? {
            errors.add("username", "Username already taken.");
        }
        if db.email_taken(&email, None)? {
            errors.add("email", "Email already registered.");
        }
        if let Err(errors) = errors.into_result() {
            return Ok(Err(errors));
        }

        let password_hash = hash_password(&password)?;
        match db.create_user(&username, &email, &password_hash) {
            Ok(id) => Ok(Ok((id, username))),
            // Lost a race with a concurrent registration.
            Err(e) if is_constraint_violation(&e) => Ok(Err(FormErrors::single(
                "username",
                "Username or email already registered.",
            ))),
            Err(e) => Err(e),
        }
    })
    .await??;

    let (user_id, username) = user_id;
    info!("Registered user {} ({})", username, user_id);

    let cookie = start_session(&state, user_id, &username, false).await?;
    let target = safe_next(query.next.as_deref()).unwrap_or_else(|| HOME.to_string());
    Ok((jar.add(cookie), Redirect::to(&target)).into_response())
}

pub async fn login_page(Extension(current): Extension<CurrentUser>) -> Response {
    if current.is_authenticated() {
        return Redirect::to(HOME).into_response();
    }
    Json(FormPage { form: "login", values: json!({ "remember": false }) }).into_response()
}

pub async fn login(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<NextQuery>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if current.is_authenticated() {
        return Ok(Redirect::to(HOME).into_response());
    }

    forms::validate_login(&form)?;

    let email = form.email.trim().to_string();
    let password = form.password;
    let user = run_db(&state, move |db| {
        let user = db.get_user_by_email(&email)?;
        // Same answer for unknown email and wrong password.
        Ok(user.filter(|u| verify_password(&password, &u.password_hash)))
    })
    .await?;

    let Some(user) = user else {
        warn!("Failed login attempt");
        return Err(AppError::AuthenticationFailure);
    };

    let cookie = start_session(&state, user.id, &user.username, form.remember).await?;
    info!("User {} logged in", user.username);

    let target = safe_next(query.next.as_deref()).unwrap_or_else(|| HOME.to_string());
    Ok((jar.add(cookie), Redirect::to(&target)).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let sid = identity.session_id.to_string();
    run_db(&state, move |db| db.delete_session(&sid)).await?;

    info!("User {} logged out", identity.username);
    Ok((jar.remove(expired_session_cookie()), Redirect::to("/login")).into_response())
}

/// Record a server-side session and hand back the cookie carrying its token.
pub async fn start_session(
    state: &AppState,
    user_id: i64,
    username: &str,
    remember: bool,
) -> Result<axum_extra::extract::cookie::Cookie<'static>, AppError> {
    let ttl = Duration::days(if remember { REMEMBER_TTL_DAYS } else { SESSION_TTL_DAYS });
    let expires_at = Utc::now() + ttl;
    let sid = Uuid::new_v4();

    let session_id = sid.to_string();
    run_db(state, move |db| {
        db.prune_expired_sessions()?;
        db.create_session(&session_id, user_id, expires_at)
    })
    .await?;

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        sid,
        exp: expires_at.timestamp() as usize,
    };
    let token = create_token(&state.secret_key, &claims)?;
    Ok(session_cookie(token, remember))
}

fn create_token(secret: &str, claims: &Claims) -> anyhow::Result<String> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}
