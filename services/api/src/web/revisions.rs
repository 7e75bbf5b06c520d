//! services/api/src/web/revisions.rs
//!
//! Revision schedule endpoints for the signed-in student.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use levelup_core::revision::{bucket, RevisionBucket};
use levelup_core::{RevisionBuckets, RevisionScheduleEntry};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{reject, Rejection};
use crate::web::state::{AppState, CurrentUser};
use crate::web::xp::AwardXpResponse;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevisionEntryResponse {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub material_type: String,
    pub revision_number: i32,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<RevisionScheduleEntry> for RevisionEntryResponse {
    fn from(entry: RevisionScheduleEntry) -> Self {
        Self {
            id: entry.id,
            topic_id: entry.topic_id,
            material_type: entry.material_type.to_string(),
            revision_number: entry.revision_number,
            due_date: entry.due_date,
            completed: entry.completed,
            completed_at: entry.completed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevisionBucketsResponse {
    pub today_date: NaiveDate,
    pub overdue: Vec<RevisionEntryResponse>,
    pub today: Vec<RevisionEntryResponse>,
    pub upcoming: Vec<RevisionEntryResponse>,
}

fn convert(entries: Vec<RevisionScheduleEntry>) -> Vec<RevisionEntryResponse> {
    entries.into_iter().map(RevisionEntryResponse::from).collect()
}

impl RevisionBucketsResponse {
    fn new(buckets: RevisionBuckets, today_date: NaiveDate) -> Self {
        Self {
            today_date,
            overdue: convert(buckets.overdue),
            today: convert(buckets.today),
            upcoming: convert(buckets.upcoming),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CompleteRevisionResponse {
    pub entry: RevisionEntryResponse,
    /// Where the entry stood when it was completed: `overdue`, `today` or `upcoming`.
    #[schema(value_type = String)]
    pub was: RevisionBucket,
    pub award: AwardXpResponse,
}

/// GET /revisions - Pending revisions grouped into overdue, today and upcoming
#[utoipa::path(
    get,
    path = "/revisions",
    responses((status = 200, description = "Pending revisions", body = RevisionBucketsResponse))
)]
pub async fn list_revisions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<RevisionBucketsResponse>, Rejection> {
    let today = Utc::now().date_naive();
    let buckets = state
        .revisions
        .buckets(user.id, today)
        .await
        .map_err(|e| reject("Failed to load revisions", e))?;
    Ok(Json(RevisionBucketsResponse::new(buckets, today)))
}

/// POST /revisions/{id}/complete - Mark a revision done and collect its XP
#[utoipa::path(
    post,
    path = "/revisions/{id}/complete",
    params(("id" = Uuid, Path, description = "Revision entry id")),
    responses(
        (status = 200, description = "Revision completed", body = CompleteRevisionResponse),
        (status = 400, description = "Already completed, or not due yet"),
        (status = 403, description = "Entry belongs to another student"),
        (status = 404, description = "No such entry")
    )
)]
pub async fn complete_revision_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<CompleteRevisionResponse>, Rejection> {
    let now = Utc::now();
    let done = state
        .revisions
        .complete(user.id, entry_id, now)
        .await
        .map_err(|e| reject("Failed to complete revision", e))?;

    let was = bucket(done.entry.due_date, now.date_naive());
    Ok(Json(CompleteRevisionResponse {
        entry: done.entry.into(),
        was,
        award: done.award.into(),
    }))
}
