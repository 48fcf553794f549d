use axum::{
    extract::{Request, State},
    http::{HeaderValue, Uri},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, Validation, decode};
use panelinha_types::api::Claims;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, run_db};

pub const SESSION_COOKIE: &str = "panelinha_session";
pub const FLASH_COOKIE: &str = "panelinha_flash";

/// The authenticated user behind a request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub session_id: Uuid,
}

/// Request-scoped "who is calling". `None` means anonymous.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<Identity>);

impl CurrentUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|i| i.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

/// Resolve the session cookie (if any) into a `CurrentUser` extension.
/// Runs on every route; bad or revoked tokens just mean anonymous.
pub async fn load_identity(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = match jar.get(SESSION_COOKIE) {
        Some(cookie) => resolve_session(&state, cookie.value()).await,
        None => None,
    };

    req.extensions_mut().insert(CurrentUser(identity));
    next.run(req).await
}

/// Gate for protected routes. Anonymous callers are sent to the login page
/// with the requested path preserved in `next`.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, AppError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .unwrap_or_default();

    match current.0 {
        Some(identity) => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        None => Err(AppError::Unauthorized {
            next: requested_target(req.uri()),
        }),
    }
}

async fn resolve_session(state: &AppState, token: &str) -> Option<Identity> {
    let claims = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.secret_key.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            debug!("Ignoring session token: {}", e);
            return None;
        }
    };

    let sid = claims.sid.to_string();
    let session = match run_db(state, move |db| db.get_session(&sid)).await {
        Ok(session) => session?,
        Err(e) => {
            warn!("Session lookup failed: {}", e);
            return None;
        }
    };

    if session.user_id != claims.sub {
        warn!("Session {} does not belong to user {}", claims.sid, claims.sub);
        return None;
    }

    Some(Identity {
        user_id: session.user_id,
        username: session.username,
        session_id: claims.sid,
    })
}

/// Path and query of the request, as a same-site redirect target.
pub fn requested_target(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Accept a post-login redirect target only when it is a local path.
/// Absolute URLs, scheme-relative `//host` and `/\host` forms are refused.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?;
    let local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.chars().any(|c| c.is_control())
        && HeaderValue::from_str(next).is_ok();
    local.then(|| next.to_string())
}

pub fn login_url(next: &str) -> String {
    format!("/login?next={}", urlencoding::encode(next))
}

pub fn session_cookie(token: String, remember: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    if remember {
        // The token and session row still expire on their own schedule.
        cookie.make_permanent();
    }
    cookie
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

pub fn flash_cookie(message: &str) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, urlencoding::encode(message).into_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_accepts_local_paths_only() {
        assert_eq!(safe_next(Some("/feed")).as_deref(), Some("/feed"));
        assert_eq!(
            safe_next(Some("/search?q=bolo&page=2")).as_deref(),
            Some("/search?q=bolo&page=2")
        );
        assert_eq!(safe_next(None), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("//evil.example/feed")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("javascript:alert(1)")), None);
        assert_eq!(safe_next(Some("feed")), None);
        assert_eq!(safe_next(Some("/feed\r\nSet-Cookie: x")), None);
    }

    #[test]
    fn requested_target_keeps_query() {
        let uri: Uri = "/feed?sort=views".parse().unwrap();
        assert_eq!(requested_target(&uri), "/feed?sort=views");
        let uri: Uri = "/my_recipes".parse().unwrap();
        assert_eq!(requested_target(&uri), "/my_recipes");
    }

    #[test]
    fn remember_me_controls_persistence() {
        let session_only = session_cookie("t".into(), false);
        assert!(session_only.max_age().is_none());
        assert_eq!(session_only.http_only(), Some(true));

        let remembered = session_cookie("t".into(), true);
        assert!(remembered.max_age().is_some());
    }

    #[test]
    fn current_user_helpers() {
        assert!(!CurrentUser::default().is_authenticated());
        let current = CurrentUser(Some(Identity {
            user_id: 7,
            username: "ana".into(),
            session_id: Uuid::new_v4(),
        }));
        assert_eq!(current.id(), Some(7));
    }
}
