//! services/api/src/web/middleware.rs
//!
//! Authentication and role middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use levelup_core::gate::authorize;
use levelup_core::Role;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::state::{AppState, CurrentUser};

/// Name of the cookie carrying the auth session id.
pub const SESSION_COOKIE: &str = "session";

/// Pulls the auth session id out of the `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// Middleware that validates the auth session cookie and loads the caller's role.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Parse session ID from cookie
    let auth_session_id = session_id_from_headers(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    // 2. Validate auth session in database, get the profile id
    let profile_id = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            warn!("Rejected auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // 3. Fetch the role, which may have changed since login
    let profile = state.db.get_profile(profile_id).await.map_err(|e| {
        error!("Failed to load profile {} for session: {:?}", profile_id, e);
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(CurrentUser {
        id: profile.id,
        role: profile.role,
    });

    Ok(next.run(req).await)
}

async fn require_roles(req: Request, next: Next, allowed: &[Role]) -> Result<Response, StatusCode> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .copied()
        .ok_or(StatusCode::UNAUTHORIZED)?;
    authorize(user.role, allowed).map_err(|_| StatusCode::FORBIDDEN)?;
    Ok(next.run(req).await)
}

/// Must run after `require_auth`.
pub async fn require_staff(req: Request, next: Next) -> Result<Response, StatusCode> {
    require_roles(req, next, &[Role::Mentor, Role::Admin]).await
}

/// Must run after `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, StatusCode> {
    require_roles(req, next, &[Role::Admin]).await
}

/// Must run after `require_auth`.
pub async fn require_student(req: Request, next: Next) -> Result<Response, StatusCode> {
    require_roles(req, next, &[Role::Student]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123"));
    }

    #[test]
    fn ignores_lookalike_and_empty_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("oldsession=x; session="));
        assert_eq!(session_id_from_headers(&headers), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }
}
