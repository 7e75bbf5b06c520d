//! services/api/src/web/profile.rs

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use levelup_core::profiles::ProfileView;
use levelup_core::{Profile, ProfileUpdate, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{reject, Rejection};
use crate::web::state::{AppState, CurrentUser};

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    #[schema(value_type = String)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            phone: p.phone,
            role: p.role,
            created_at: p.created_at,
        }
    }
}

/// Own profile plus the role-specific details, when any were filled in.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetailsResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub expertise: Option<String>,
    pub bio: Option<String>,
}

impl From<ProfileView> for ProfileDetailsResponse {
    fn from(view: ProfileView) -> Self {
        let (grade, school) = view
            .student
            .map(|s| (s.grade, s.school))
            .unwrap_or_default();
        let (expertise, bio) = view
            .mentor
            .map(|m| (m.expertise, m.bio))
            .unwrap_or_default();
        Self {
            profile: view.profile.into(),
            grade,
            school,
            expertise,
            bio,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// GET /profile
#[utoipa::path(
    get,
    path = "/profile",
    responses((status = 200, description = "Signed-in profile", body = ProfileDetailsResponse))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProfileDetailsResponse>, Rejection> {
    let view = state
        .profiles
        .view(user.id)
        .await
        .map_err(|e| reject("Failed to load profile", e))?;
    Ok(Json(view.into()))
}

/// PUT /profile - Edit name and phone
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Empty name")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, Rejection> {
    let profile = state
        .profiles
        .update(
            user.id,
            user.role,
            user.id,
            ProfileUpdate {
                full_name: req.full_name,
                phone: req.phone,
            },
        )
        .await
        .map_err(|e| reject("Failed to update profile", e))?;
    Ok(Json(profile.into()))
}
