//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for signup, login, logout, the session gate and
//! password changes.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use levelup_core::gate::landing_path;
use levelup_core::{PortError, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{reject, Rejection};
use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::state::{AppState, CurrentUser};

const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    /// `student` (default) or `mentor`. Admins are promoted by another admin.
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub profile_id: Uuid,
    pub email: String,
    #[schema(value_type = String)]
    pub role: Role,
    /// Where the client should send this role after sign-in.
    pub landing_path: String,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub profile_id: Uuid,
    pub email: String,
    pub full_name: String,
    #[schema(value_type = String)]
    pub role: Role,
    pub landing_path: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn hash_password(password: &str) -> Result<String, Rejection> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, hashed: &str) -> Result<bool, Rejection> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn check_password_strength(password: &str) -> Result<(), Rejection> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

fn session_cookie(session_id: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        ttl.num_seconds()
    )
}

/// Creates an auth session row and returns the cookie that carries it.
async fn open_session(state: &AppState, profile_id: Uuid) -> Result<String, Rejection> {
    let ttl = Duration::days(state.config.session_ttl_days);
    let auth_session_id = Uuid::new_v4().to_string();
    state
        .db
        .create_auth_session(&auth_session_id, profile_id, Utc::now() + ttl)
        .await
        .map_err(|e| reject("Failed to create session", e))?;
    Ok(session_cookie(&auth_session_id, ttl))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account and sign it in
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid request or email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()));
    }
    if req.full_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Full name is required".to_string()));
    }
    check_password_strength(&req.password)?;
    let role = req.role.unwrap_or(Role::Student);
    if role == Role::Admin {
        return Err((
            StatusCode::FORBIDDEN,
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let profile = state
        .db
        .create_profile(&email, req.full_name.trim(), &password_hash, role)
        .await
        .map_err(|e| reject("Failed to create account", e))?;
    info!("New {} account {}", profile.role, profile.id);

    let cookie = open_session(&state, profile.id).await?;
    let response = AuthResponse {
        profile_id: profile.id,
        email: profile.email,
        role: profile.role,
        landing_path: landing_path(profile.role).to_string(),
    };

    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    let creds = match state
        .db
        .get_credentials_by_email(&req.email.trim().to_lowercase())
        .await
    {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid()),
        Err(e) => return Err(reject("Failed to load account", e)),
    };

    if !verify_password(&req.password, &creds.hashed_password)? {
        return Err(invalid());
    }

    let cookie = open_session(&state, creds.profile_id).await?;
    let response = AuthResponse {
        profile_id: creds.profile_id,
        email: creds.email,
        role: creds.role,
        landing_path: landing_path(creds.role).to_string(),
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Rejection> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| reject("Failed to logout", e))?;

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /session - Who is signed in and where their role lands
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SessionResponse>, Rejection> {
    let profile = state
        .db
        .get_profile(user.id)
        .await
        .map_err(|e| reject("Failed to load session", e))?;
    Ok(Json(SessionResponse {
        profile_id: profile.id,
        email: profile.email,
        full_name: profile.full_name,
        role: profile.role,
        landing_path: landing_path(profile.role).to_string(),
    }))
}

/// PUT /auth/password - Change the signed-in user's password
#[utoipa::path(
    put,
    path = "/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password too weak"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, Rejection> {
    check_password_strength(&req.new_password)?;
    let creds = state
        .db
        .get_credentials(user.id)
        .await
        .map_err(|e| reject("Failed to load account", e))?;
    if !verify_password(&req.current_password, &creds.hashed_password)? {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(&req.new_password)?;
    state
        .db
        .update_password(user.id, &password_hash)
        .await
        .map_err(|e| reject("Failed to update password", e))?;
    info!("Password changed for {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_their_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("long enough").is_ok());
    }
}
