//! services/api/src/web/leaderboard.rs

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use levelup_core::leaderboard::{RankedStudent, Standing};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{reject, Rejection};
use crate::web::state::{AppState, CurrentUser};

#[derive(Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// Defaults to 10, at most 100.
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntryResponse {
    pub rank: i64,
    pub student_id: Uuid,
    pub full_name: String,
    pub total_xp: i64,
    pub level: i64,
}

impl From<RankedStudent> for LeaderboardEntryResponse {
    fn from(r: RankedStudent) -> Self {
        Self {
            rank: r.rank,
            student_id: r.student_id,
            full_name: r.full_name,
            total_xp: r.total_xp,
            level: r.level,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StandingResponse {
    pub rank: Option<i64>,
    pub total_xp: i64,
    pub level: i64,
    pub xp_to_next: i64,
}

impl From<Standing> for StandingResponse {
    fn from(s: Standing) -> Self {
        Self {
            rank: s.rank,
            total_xp: s.total_xp,
            level: s.level,
            xp_to_next: s.xp_to_next,
        }
    }
}

/// GET /leaderboard - Top students by total XP
#[utoipa::path(
    get,
    path = "/leaderboard",
    params(LeaderboardQuery),
    responses((status = 200, description = "Ranked students", body = [LeaderboardEntryResponse]))
)]
pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntryResponse>>, Rejection> {
    let ranked = state
        .leaderboard
        .top(query.limit.unwrap_or(10))
        .await
        .map_err(|e| reject("Failed to load leaderboard", e))?;
    Ok(Json(ranked.into_iter().map(Into::into).collect()))
}

/// GET /leaderboard/me - The signed-in student's own rank
#[utoipa::path(
    get,
    path = "/leaderboard/me",
    responses((status = 200, description = "Own standing", body = StandingResponse))
)]
pub async fn my_standing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<StandingResponse>, Rejection> {
    let standing = state
        .leaderboard
        .standing(user.id)
        .await
        .map_err(|e| reject("Failed to load standing", e))?;
    Ok(Json(standing.into()))
}
