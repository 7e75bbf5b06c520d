//! crates/levelup_core/src/leaderboard.rs
//!
//! Ranking of students by cumulative XP.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::ports::{optional, DatabaseService, LeaderboardRow, PortResult};
use crate::xp::xp_to_next;

pub const MAX_LEADERBOARD_SIZE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub rank: i64,
    pub student_id: Uuid,
    pub full_name: String,
    pub total_xp: i64,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    /// `None` until the student has earned any XP.
    pub rank: Option<i64>,
    pub total_xp: i64,
    pub level: i64,
    pub xp_to_next: i64,
}

/// Assigns competition ranks ("1, 2, 2, 4") to rows already sorted by XP.
pub fn rank_rows(rows: Vec<LeaderboardRow>) -> Vec<RankedStudent> {
    let mut ranked: Vec<RankedStudent> = Vec::with_capacity(rows.len());
    for (position, row) in rows.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(prev) if prev.total_xp == row.total_xp => prev.rank,
            _ => position as i64 + 1,
        };
        ranked.push(RankedStudent {
            rank,
            student_id: row.student_id,
            full_name: row.full_name,
            total_xp: row.total_xp,
            level: row.level,
        });
    }
    ranked
}

pub struct Leaderboard {
    db: Arc<dyn DatabaseService>,
}

impl Leaderboard {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn top(&self, limit: i64) -> PortResult<Vec<RankedStudent>> {
        let rows = self
            .db
            .list_leaderboard(limit.clamp(1, MAX_LEADERBOARD_SIZE))
            .await?;
        Ok(rank_rows(rows))
    }

    pub async fn standing(&self, student_id: Uuid) -> PortResult<Standing> {
        match optional(self.db.get_level_system(student_id).await)? {
            Some(row) => {
                let above = self.db.count_students_above(row.total_xp).await?;
                Ok(Standing {
                    rank: Some(above + 1),
                    total_xp: row.total_xp,
                    level: row.level,
                    xp_to_next: xp_to_next(row.total_xp),
                })
            }
            None => Ok(Standing {
                rank: None,
                total_xp: 0,
                level: 1,
                xp_to_next: xp_to_next(0),
            }),
        }
    }
}
