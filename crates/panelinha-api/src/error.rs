use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use panelinha_types::api::FormErrors;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::middleware::{flash_cookie, login_url};

pub const BAD_CREDENTIALS: &str = "Invalid email or password.";
pub const LOGIN_REQUIRED: &str = "Please log in to access this page.";

#[derive(Error, Debug)]
pub enum AppError {
    /// Bad or duplicate form input; answered with the per-field messages.
    #[error("form validation failed")]
    Validation(FormErrors),

    #[error("not found")]
    NotFound,

    /// The caller is not allowed to touch this entity. Answered with a flash
    /// message and a redirect rather than an error page.
    #[error("{message}")]
    Forbidden { message: String, redirect: String },

    #[error("{}", BAD_CREDENTIALS)]
    AuthenticationFailure,

    /// Anonymous access to a protected page. `next` is where to come back to.
    #[error("login required for {next}")]
    Unauthorized { next: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn forbidden(message: &str, redirect: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.to_string(),
            redirect: redirect.into(),
        }
    }

    pub fn field(field: &str, message: &str) -> Self {
        AppError::Validation(FormErrors::single(field, message))
    }
}

impl From<FormErrors> for AppError {
    fn from(errors: FormErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors }))).into_response()
            }
            AppError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
            }
            AppError::Forbidden { message, redirect } => {
                let jar = CookieJar::new().add(flash_cookie(&message));
                (jar, Redirect::to(&redirect)).into_response()
            }
            AppError::AuthenticationFailure => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": BAD_CREDENTIALS }))).into_response()
            }
            AppError::Unauthorized { next } => {
                let jar = CookieJar::new().add(flash_cookie(LOGIN_REQUIRED));
                (jar, Redirect::to(&login_url(&next))).into_response()
            }
            AppError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn forbidden_redirects_with_flash() {
        let response = AppError::forbidden("Not yours.", "/recipe/3").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/recipe/3");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("panelinha_flash="));
    }

    #[test]
    fn unauthorized_points_at_login_with_next() {
        let response = AppError::Unauthorized { next: "/feed?sort=popular".into() }.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?next=%2Ffeed%3Fsort%3Dpopular"
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::AuthenticationFailure.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::field("title", "required").into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
