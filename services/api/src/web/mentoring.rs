//! services/api/src/web/mentoring.rs
//!
//! Mentor roster and admin management endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use levelup_core::mentors::MentoredStudent;
use levelup_core::{MentorAssignment, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{reject, Rejection};
use crate::web::profile::ProfileResponse;
use crate::web::state::{AppState, CurrentUser};
use crate::web::xp::ProgressResponse;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MentoredStudentResponse {
    pub profile: ProfileResponse,
    pub progress: ProgressResponse,
}

impl From<MentoredStudent> for MentoredStudentResponse {
    fn from(s: MentoredStudent) -> Self {
        Self {
            profile: s.profile.into(),
            progress: s.progress.into(),
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct ProfilesQuery {
    /// Only list profiles with this role.
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    #[schema(value_type = String)]
    pub role: Role,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignMentorRequest {
    pub student_id: Uuid,
    pub mentor_id: Uuid,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub mentor_id: Uuid,
    pub active: bool,
    pub assigned_at: DateTime<Utc>,
}

impl From<MentorAssignment> for AssignmentResponse {
    fn from(a: MentorAssignment) -> Self {
        Self {
            id: a.id,
            student_id: a.student_id,
            mentor_id: a.mentor_id,
            active: a.active,
            assigned_at: a.assigned_at,
        }
    }
}

/// GET /mentor/students - Students actively assigned to the signed-in mentor
#[utoipa::path(
    get,
    path = "/mentor/students",
    responses((status = 200, description = "Assigned students with progress", body = [MentoredStudentResponse]))
)]
pub async fn my_students_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<MentoredStudentResponse>>, Rejection> {
    let students = state
        .mentoring
        .students_of(user.id)
        .await
        .map_err(|e| reject("Failed to load students", e))?;
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

/// GET /admin/profiles - Every profile, optionally filtered by role
#[utoipa::path(
    get,
    path = "/admin/profiles",
    params(ProfilesQuery),
    responses(
        (status = 200, description = "Profiles", body = [ProfileResponse]),
        (status = 400, description = "Unknown role")
    )
)]
pub async fn list_profiles_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ProfilesQuery>,
) -> Result<Json<Vec<ProfileResponse>>, Rejection> {
    let role = query
        .role
        .as_deref()
        .map(str::parse::<Role>)
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let profiles = state
        .profiles
        .list(user.role, role)
        .await
        .map_err(|e| reject("Failed to list profiles", e))?;
    Ok(Json(profiles.into_iter().map(Into::into).collect()))
}

/// PUT /admin/profiles/{id}/role - Move a profile to another role
#[utoipa::path(
    put,
    path = "/admin/profiles/{id}/role",
    params(("id" = Uuid, Path, description = "Profile id")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = ProfileResponse),
        (status = 400, description = "Cannot change own role"),
        (status = 404, description = "No such profile")
    )
)]
pub async fn change_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(profile_id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<ProfileResponse>, Rejection> {
    let profile = state
        .profiles
        .change_role(user.id, user.role, profile_id, req.role)
        .await
        .map_err(|e| reject("Failed to change role", e))?;
    Ok(Json(profile.into()))
}

/// POST /admin/assignments - Assign a student to a mentor
#[utoipa::path(
    post,
    path = "/admin/assignments",
    request_body = AssignMentorRequest,
    responses(
        (status = 201, description = "Assignment created", body = AssignmentResponse),
        (status = 400, description = "Profiles do not have the expected roles")
    )
)]
pub async fn assign_mentor_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssignMentorRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>), Rejection> {
    let assignment = state
        .mentoring
        .assign(req.student_id, req.mentor_id)
        .await
        .map_err(|e| reject("Failed to assign mentor", e))?;
    Ok((StatusCode::CREATED, Json(assignment.into())))
}

/// DELETE /admin/assignments/{id} - End an assignment
#[utoipa::path(
    delete,
    path = "/admin/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 204, description = "Assignment ended"),
        (status = 404, description = "No such assignment")
    )
)]
pub async fn unassign_mentor_handler(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    state
        .mentoring
        .unassign(assignment_id)
        .await
        .map_err(|e| reject("Failed to end assignment", e))?;
    Ok(StatusCode::NO_CONTENT)
}
