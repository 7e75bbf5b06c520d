//! services/api/src/web/xp.rs
//!
//! XP endpoints: award, progress and history for the signed-in student.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use levelup_core::{AwardRequest, XpAward, XpEvent, XpEventType, XpProgress};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{reject, Rejection};
use crate::web::state::{AppState, CurrentUser};

#[derive(Deserialize, ToSchema)]
pub struct AwardXpRequest {
    /// One of `video_watched`, `notes_read`, `flashcards_completed`, `test_score`.
    pub event_type: String,
    /// The material the event happened on. Its type must match `event_type`.
    pub material_id: Option<Uuid>,
    /// Accepted for older clients. The material's own topic is recorded.
    pub topic_id: Option<Uuid>,
    /// Required for `test_score`.
    pub score: Option<i64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardXpResponse {
    pub xp_earned: i64,
    pub new_total: i64,
    pub leveled_up: bool,
    pub new_level: i64,
    pub cooldown_active: bool,
}

impl From<XpAward> for AwardXpResponse {
    fn from(award: XpAward) -> Self {
        Self {
            xp_earned: award.xp_earned,
            new_total: award.new_total,
            leveled_up: award.leveled_up,
            new_level: award.new_level,
            cooldown_active: award.cooldown_active,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub total_xp: i64,
    pub level: i64,
    pub xp_to_next: i64,
    pub progress_percent: i64,
}

impl From<XpProgress> for ProgressResponse {
    fn from(p: XpProgress) -> Self {
        Self {
            total_xp: p.total_xp,
            level: p.level,
            xp_to_next: p.xp_to_next,
            progress_percent: p.progress_percent,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct XpEventResponse {
    pub id: Uuid,
    pub event_type: String,
    /// The material the event happened on. Its type must match `event_type`.
    pub material_id: Option<Uuid>,
    /// Accepted for older clients. The material's own topic is recorded.
    pub topic_id: Option<Uuid>,
    pub xp_amount: i64,
    pub created_at: DateTime<Utc>,
}

impl From<XpEvent> for XpEventResponse {
    fn from(event: XpEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            material_id: event.material_id,
            topic_id: event.topic_id,
            xp_amount: event.xp_amount,
            created_at: event.created_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Defaults to 20, at most 200.
    pub limit: Option<i64>,
}

/// POST /xp/award - Grant XP for something the student just did
#[utoipa::path(
    post,
    path = "/xp/award",
    request_body = AwardXpRequest,
    responses(
        (status = 200, description = "Award processed; `cooldownActive` marks a suppressed repeat", body = AwardXpResponse),
        (status = 400, description = "Unknown or server-only event type, missing score, or a material of another type"),
        (status = 403, description = "Only students earn XP"),
        (status = 404, description = "Unknown material")
    )
)]
pub async fn award_xp_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<AwardXpRequest>,
) -> Result<Json<AwardXpResponse>, Rejection> {
    let event_type = req
        .event_type
        .parse::<XpEventType>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    if event_type == XpEventType::RevisionCompleted {
        return Err((
            StatusCode::BAD_REQUEST,
            "revision_completed is granted by completing a revision".to_string(),
        ));
    }

    let award = state
        .xp
        .award(
            &AwardRequest {
                event_type,
                material_id: req.material_id,
                student_id: user.id,
                topic_id: req.topic_id,
                score: req.score,
            },
            Utc::now(),
        )
        .await
        .map_err(|e| reject("Failed to award XP", e))?;

    Ok(Json(award.into()))
}

/// GET /xp/progress - Total XP, level and distance to the next level
#[utoipa::path(
    get,
    path = "/xp/progress",
    responses((status = 200, description = "Current progress", body = ProgressResponse))
)]
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProgressResponse>, Rejection> {
    let progress = state
        .xp
        .progress(user.id)
        .await
        .map_err(|e| reject("Failed to load progress", e))?;
    Ok(Json(progress.into()))
}

/// GET /xp/history - Most recent XP grants
#[utoipa::path(
    get,
    path = "/xp/history",
    params(HistoryQuery),
    responses((status = 200, description = "Recent XP events", body = [XpEventResponse]))
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<XpEventResponse>>, Rejection> {
    let events = state
        .xp
        .history(user.id, query.limit.unwrap_or(20))
        .await
        .map_err(|e| reject("Failed to load XP history", e))?;
    Ok(Json(events.into_iter().map(XpEventResponse::from).collect()))
}
