//! crates/levelup_core/src/xp.rs
//!
//! The XP engine: a fixed award table, level arithmetic over 1000-point bands,
//! and a server-side cooldown that suppresses repeated grants for one action.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{MaterialType, XpEvent};
use crate::ports::{optional, DatabaseService, PortError, PortResult};

/// Width of one level band.
pub const XP_PER_LEVEL: i64 = 1000;

/// How long an identical grant is suppressed after it succeeded.
pub const DEFAULT_COOLDOWN_SECS: i64 = 180;

//=========================================================================================
// Level arithmetic
//=========================================================================================

/// `floor(total_xp / 1000) + 1`. Negative totals are treated as zero.
pub fn level_for(total_xp: i64) -> i64 {
    total_xp.max(0) / XP_PER_LEVEL + 1
}

/// XP still missing before the next level. Always in `1..=1000`.
pub fn xp_to_next(total_xp: i64) -> i64 {
    level_for(total_xp) * XP_PER_LEVEL - total_xp.max(0)
}

/// Progress within the current band, 0-100.
pub fn progress_percent(total_xp: i64) -> i64 {
    (total_xp.max(0) % XP_PER_LEVEL) * 100 / XP_PER_LEVEL
}

//=========================================================================================
// Event table
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpEventType {
    VideoWatched,
    NotesRead,
    FlashcardsCompleted,
    RevisionCompleted,
    TestScore,
}

impl XpEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            XpEventType::VideoWatched => "video_watched",
            XpEventType::NotesRead => "notes_read",
            XpEventType::FlashcardsCompleted => "flashcards_completed",
            XpEventType::RevisionCompleted => "revision_completed",
            XpEventType::TestScore => "test_score",
        }
    }

    /// The kind of material the event is earned on. Revision completions are
    /// keyed by their schedule entry instead.
    pub fn material_type(&self) -> Option<MaterialType> {
        match self {
            XpEventType::VideoWatched => Some(MaterialType::Video),
            XpEventType::NotesRead => Some(MaterialType::Notes),
            XpEventType::FlashcardsCompleted => Some(MaterialType::Flashcards),
            XpEventType::TestScore => Some(MaterialType::Test),
            XpEventType::RevisionCompleted => None,
        }
    }
}

impl fmt::Display for XpEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XpEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video_watched" => Ok(XpEventType::VideoWatched),
            "notes_read" => Ok(XpEventType::NotesRead),
            "flashcards_completed" => Ok(XpEventType::FlashcardsCompleted),
            "revision_completed" => Ok(XpEventType::RevisionCompleted),
            "test_score" => Ok(XpEventType::TestScore),
            other => Err(format!("unknown xp event type '{}'", other)),
        }
    }
}

/// XP granted for a test, tiered by raw score.
pub fn test_score_xp(score: i64) -> i64 {
    match score {
        s if s >= 16 => 50,
        s if s >= 11 => 25,
        s if s >= 7 => 10,
        _ => 0,
    }
}

/// Looks up the XP value of an event. `test_score` requires a score.
pub fn xp_for_event(event_type: XpEventType, score: Option<i64>) -> PortResult<i64> {
    let xp = match event_type {
        XpEventType::VideoWatched => 20,
        XpEventType::NotesRead => 15,
        XpEventType::FlashcardsCompleted => 15,
        XpEventType::RevisionCompleted => 25,
        XpEventType::TestScore => {
            let score = score.ok_or_else(|| {
                PortError::Invalid("test_score events require a score".to_string())
            })?;
            test_score_xp(score)
        }
    };
    Ok(xp)
}

//=========================================================================================
// Cooldown
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CooldownKey {
    event_type: XpEventType,
    material_id: Option<Uuid>,
    student_id: Uuid,
}

/// Remembers when each (event, material, student) last earned XP.
#[derive(Debug)]
pub struct CooldownTable {
    window: Duration,
    last_grant: Mutex<HashMap<CooldownKey, DateTime<Utc>>>,
}

impl CooldownTable {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_grant: Mutex::new(HashMap::new()),
        }
    }

    /// Claims the slot for a grant at `now`. Returns `false` if a grant for the same
    /// key happened less than one window ago.
    fn try_claim(&self, key: &CooldownKey, now: DateTime<Utc>) -> bool {
        let mut guard = match self.last_grant.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.retain(|_, at| now - *at < self.window);
        if guard.contains_key(key) {
            return false;
        }
        guard.insert(key.clone(), now);
        true
    }

    fn release(&self, key: &CooldownKey) {
        let mut guard = match self.last_grant.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.remove(key);
    }
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

//=========================================================================================
// Engine
//=========================================================================================

/// A request to grant XP for something a student did.
#[derive(Debug, Clone)]
pub struct AwardRequest {
    pub event_type: XpEventType,
    /// Required for material events. For revisions it carries the schedule entry id.
    pub material_id: Option<Uuid>,
    pub student_id: Uuid,
    /// Only read for revisions. Material events take the topic of their material.
    pub topic_id: Option<Uuid>,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpAward {
    pub xp_earned: i64,
    pub new_total: i64,
    pub leveled_up: bool,
    pub new_level: i64,
    pub cooldown_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpProgress {
    pub total_xp: i64,
    pub level: i64,
    pub xp_to_next: i64,
    pub progress_percent: i64,
}

impl XpAward {
    fn unchanged(total_xp: i64, cooldown_active: bool) -> Self {
        Self {
            xp_earned: 0,
            new_total: total_xp,
            leveled_up: false,
            new_level: level_for(total_xp),
            cooldown_active,
        }
    }
}

impl XpProgress {
    pub fn from_total(total_xp: i64) -> Self {
        Self {
            total_xp,
            level: level_for(total_xp),
            xp_to_next: xp_to_next(total_xp),
            progress_percent: progress_percent(total_xp),
        }
    }
}

pub struct XpEngine {
    db: Arc<dyn DatabaseService>,
    cooldowns: CooldownTable,
}

impl XpEngine {
    pub fn new(db: Arc<dyn DatabaseService>, cooldowns: CooldownTable) -> Self {
        Self { db, cooldowns }
    }

    async fn current_total(&self, student_id: Uuid) -> PortResult<i64> {
        let row = optional(self.db.get_level_system(student_id).await)?;
        Ok(row.map(|r| r.total_xp).unwrap_or(0))
    }

    /// Checks that a material event names an existing material of the matching kind
    /// and returns the topic to log the event under.
    async fn resolve_topic(&self, request: &AwardRequest) -> PortResult<Option<Uuid>> {
        let Some(expected) = request.event_type.material_type() else {
            return Ok(request.topic_id);
        };
        let material_id = request.material_id.ok_or_else(|| {
            PortError::Invalid(format!("{} events require a material_id", request.event_type))
        })?;
        let material = self.db.get_material(material_id).await?;
        if material.material_type != expected {
            return Err(PortError::Invalid(format!(
                "material {} is {}, which does not earn {}",
                material_id, material.material_type, request.event_type
            )));
        }
        Ok(Some(material.topic_id))
    }

    /// Grants XP for an event.
    ///
    /// The total is incremented first and a failure there fails the award.
    /// The event log append happens afterwards and its failure is only logged.
    pub async fn award(&self, request: &AwardRequest, now: DateTime<Utc>) -> PortResult<XpAward> {
        let topic_id = self.resolve_topic(request).await?;
        let xp = xp_for_event(request.event_type, request.score)?;
        if xp == 0 {
            let total = self.current_total(request.student_id).await?;
            return Ok(XpAward::unchanged(total, false));
        }

        let key = CooldownKey {
            event_type: request.event_type,
            material_id: request.material_id,
            student_id: request.student_id,
        };
        if !self.cooldowns.try_claim(&key, now) {
            info!(
                "XP cooldown active for {} on student {}",
                request.event_type, request.student_id
            );
            let total = self.current_total(request.student_id).await?;
            return Ok(XpAward::unchanged(total, true));
        }

        let row = match self.db.add_xp(request.student_id, xp, now).await {
            Ok(row) => row,
            Err(e) => {
                // Nothing was granted; free the slot for a retry.
                self.cooldowns.release(&key);
                return Err(e);
            }
        };
        let old_level = level_for(row.total_xp - xp);

        let event = XpEvent {
            id: Uuid::new_v4(),
            student_id: request.student_id,
            event_type: request.event_type.to_string(),
            material_id: request.material_id,
            topic_id,
            xp_amount: xp,
            created_at: now,
        };
        if let Err(e) = self.db.insert_xp_event(&event).await {
            warn!(
                "Failed to record XP event for student {}: {:?}",
                request.student_id, e
            );
        }

        if row.level > old_level {
            info!("Student {} reached level {}", request.student_id, row.level);
        }

        Ok(XpAward {
            xp_earned: xp,
            new_total: row.total_xp,
            leveled_up: row.level > old_level,
            new_level: row.level,
            cooldown_active: false,
        })
    }

    pub async fn progress(&self, student_id: Uuid) -> PortResult<XpProgress> {
        let total = self.current_total(student_id).await?;
        Ok(XpProgress::from_total(total))
    }

    pub async fn history(&self, student_id: Uuid, limit: i64) -> PortResult<Vec<XpEvent>> {
        self.db.list_xp_events(student_id, limit.clamp(1, 200)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_follows_thousand_point_bands() {
        for total in [0, 1, 999, 1000, 1001, 2500, 9_999, 10_000, 123_456] {
            assert_eq!(level_for(total), total / 1000 + 1, "total {}", total);
        }
    }

    #[test]
    fn xp_to_next_is_remaining_band() {
        assert_eq!(xp_to_next(0), 1000);
        assert_eq!(xp_to_next(999), 1);
        assert_eq!(xp_to_next(1000), 1000);
        assert_eq!(xp_to_next(2750), 250);
        for total in 0..5000 {
            let remaining = xp_to_next(total);
            assert_eq!(remaining, level_for(total) * 1000 - total);
            assert!(remaining >= 0);
        }
    }

    #[test]
    fn test_score_tiers() {
        assert_eq!(test_score_xp(20), 50);
        assert_eq!(test_score_xp(16), 50);
        assert_eq!(test_score_xp(12), 25);
        assert_eq!(test_score_xp(11), 25);
        assert_eq!(test_score_xp(8), 10);
        assert_eq!(test_score_xp(7), 10);
        assert_eq!(test_score_xp(3), 0);
    }

    #[test]
    fn material_events_map_to_their_material_type() {
        assert_eq!(XpEventType::VideoWatched.material_type(), Some(MaterialType::Video));
        assert_eq!(XpEventType::NotesRead.material_type(), Some(MaterialType::Notes));
        assert_eq!(
            XpEventType::FlashcardsCompleted.material_type(),
            Some(MaterialType::Flashcards)
        );
        assert_eq!(XpEventType::TestScore.material_type(), Some(MaterialType::Test));
        assert_eq!(XpEventType::RevisionCompleted.material_type(), None);
    }

    #[test]
    fn test_score_event_needs_score() {
        assert!(matches!(
            xp_for_event(XpEventType::TestScore, None),
            Err(PortError::Invalid(_))
        ));
        assert_eq!(xp_for_event(XpEventType::TestScore, Some(20)).unwrap(), 50);
        assert_eq!(xp_for_event(XpEventType::VideoWatched, None).unwrap(), 20);
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            "revision_completed".parse::<XpEventType>(),
            Ok(XpEventType::RevisionCompleted)
        );
        assert!("unknown".parse::<XpEventType>().is_err());
    }

    #[test]
    fn cooldown_expires_after_window() {
        let table = CooldownTable::new(Duration::minutes(3));
        let key = CooldownKey {
            event_type: XpEventType::VideoWatched,
            material_id: Some(Uuid::new_v4()),
            student_id: Uuid::new_v4(),
        };
        let start = Utc::now();
        assert!(table.try_claim(&key, start));
        assert!(!table.try_claim(&key, start + Duration::seconds(179)));
        assert!(table.try_claim(&key, start + Duration::minutes(3)));
    }

    #[test]
    fn cooldown_is_keyed_per_material() {
        let table = CooldownTable::default();
        let student_id = Uuid::new_v4();
        let now = Utc::now();
        let a = CooldownKey {
            event_type: XpEventType::NotesRead,
            material_id: Some(Uuid::new_v4()),
            student_id,
        };
        let b = CooldownKey {
            material_id: Some(Uuid::new_v4()),
            ..a.clone()
        };
        assert!(table.try_claim(&a, now));
        assert!(table.try_claim(&b, now));
    }
}
