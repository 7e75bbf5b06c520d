//! crates/levelup_core/src/revision.rs
//!
//! Spaced-repetition scheduling. The first time a student opens a kind of material
//! for a topic, one entry per fixed interval is created. Pending entries are then
//! grouped by how their due date compares to today.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{MaterialType, RevisionScheduleEntry};
use crate::ports::{DatabaseService, PortError, PortResult};
use crate::xp::{AwardRequest, XpAward, XpEngine, XpEventType};

/// Day offsets, counted from the first open, at which revisions fall due.
pub const REVISION_INTERVALS_DAYS: [u64; 4] = [1, 7, 14, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionBucket {
    Overdue,
    Today,
    Upcoming,
}

pub fn bucket(due_date: NaiveDate, today: NaiveDate) -> RevisionBucket {
    if due_date < today {
        RevisionBucket::Overdue
    } else if due_date == today {
        RevisionBucket::Today
    } else {
        RevisionBucket::Upcoming
    }
}

/// Due date of the revision at `revision_number`, or `None` past the end of the table.
pub fn due_date_for(opened_on: NaiveDate, revision_number: i32) -> Option<NaiveDate> {
    let index = usize::try_from(revision_number).ok()?;
    let offset = REVISION_INTERVALS_DAYS.get(index)?;
    opened_on.checked_add_days(Days::new(*offset))
}

/// Builds the full set of entries for a first open on `opened_on`.
pub fn plan_entries(
    student_id: Uuid,
    topic_id: Uuid,
    material_type: MaterialType,
    opened_on: NaiveDate,
) -> PortResult<Vec<RevisionScheduleEntry>> {
    (0..REVISION_INTERVALS_DAYS.len() as i32)
        .map(|revision_number| {
            let due_date = due_date_for(opened_on, revision_number)
                .ok_or_else(|| PortError::Invalid("revision date out of range".to_string()))?;
            Ok(RevisionScheduleEntry {
                id: Uuid::new_v4(),
                student_id,
                topic_id,
                material_type,
                revision_number,
                due_date,
                completed: false,
                completed_at: None,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionBuckets {
    pub overdue: Vec<RevisionScheduleEntry>,
    pub today: Vec<RevisionScheduleEntry>,
    pub upcoming: Vec<RevisionScheduleEntry>,
}

impl RevisionBuckets {
    /// Splits pending entries by due date. Completed entries are dropped.
    pub fn partition(entries: Vec<RevisionScheduleEntry>, today: NaiveDate) -> Self {
        let mut buckets = Self::default();
        for entry in entries.into_iter().filter(|e| !e.completed) {
            match bucket(entry.due_date, today) {
                RevisionBucket::Overdue => buckets.overdue.push(entry),
                RevisionBucket::Today => buckets.today.push(entry),
                RevisionBucket::Upcoming => buckets.upcoming.push(entry),
            }
        }
        for list in [
            &mut buckets.overdue,
            &mut buckets.today,
            &mut buckets.upcoming,
        ] {
            list.sort_by(|a, b| {
                a.due_date
                    .cmp(&b.due_date)
                    .then(a.revision_number.cmp(&b.revision_number))
            });
        }
        buckets
    }
}

/// Result of completing a revision.
#[derive(Debug, Clone)]
pub struct CompletedRevision {
    pub entry: RevisionScheduleEntry,
    pub award: XpAward,
}

pub struct RevisionScheduler {
    db: Arc<dyn DatabaseService>,
    xp: Arc<XpEngine>,
}

impl RevisionScheduler {
    pub fn new(db: Arc<dyn DatabaseService>, xp: Arc<XpEngine>) -> Self {
        Self { db, xp }
    }

    /// Creates the schedule for a (student, topic, material type) unless one exists.
    /// Returns the entries that were created, empty when already scheduled.
    pub async fn schedule_on_first_open(
        &self,
        student_id: Uuid,
        topic_id: Uuid,
        material_type: MaterialType,
        opened_on: NaiveDate,
    ) -> PortResult<Vec<RevisionScheduleEntry>> {
        let existing = self
            .db
            .list_revision_entries_for(student_id, topic_id, material_type)
            .await?;
        if !existing.is_empty() {
            return Ok(Vec::new());
        }

        let planned = plan_entries(student_id, topic_id, material_type, opened_on)?;
        self.db.insert_revision_entries(&planned).await?;

        // A concurrent first open may have won the insert; report only rows that are ours.
        let stored = self
            .db
            .list_revision_entries_for(student_id, topic_id, material_type)
            .await?;
        let created: Vec<RevisionScheduleEntry> = stored
            .into_iter()
            .filter(|e| planned.iter().any(|p| p.id == e.id))
            .collect();
        info!(
            "Scheduled {} revisions of {} for student {} on topic {}",
            created.len(),
            material_type,
            student_id,
            topic_id
        );
        Ok(created)
    }

    pub async fn buckets(&self, student_id: Uuid, today: NaiveDate) -> PortResult<RevisionBuckets> {
        let entries = self.db.list_revision_entries(student_id).await?;
        Ok(RevisionBuckets::partition(entries, today))
    }

    /// Marks a due entry done and grants the fixed revision XP.
    ///
    /// Entries become completable on their due date. No follow-up date is computed
    /// here: every due date was fixed at first open. If the grant fails the entry is
    /// reopened so the student can try again.
    pub async fn complete(
        &self,
        student_id: Uuid,
        entry_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<CompletedRevision> {
        let mut entry = self.db.get_revision_entry(entry_id).await?;
        if entry.student_id != student_id {
            return Err(PortError::Forbidden(format!(
                "revision {} belongs to another student",
                entry_id
            )));
        }
        if usize::try_from(entry.revision_number)
            .map_or(true, |n| n >= REVISION_INTERVALS_DAYS.len())
        {
            return Err(PortError::Invalid(format!(
                "revision number {} is outside the interval table",
                entry.revision_number
            )));
        }
        if entry.completed {
            return Err(PortError::Invalid(format!(
                "revision {} is already completed",
                entry_id
            )));
        }

        if bucket(entry.due_date, now.date_naive()) == RevisionBucket::Upcoming {
            return Err(PortError::Invalid(format!(
                "revision {} is not due until {}",
                entry_id, entry.due_date
            )));
        }

        self.db.mark_revision_completed(entry_id, now).await?;
        entry.completed = true;
        entry.completed_at = Some(now);

        let granted = self
            .xp
            .award(
                &AwardRequest {
                    event_type: XpEventType::RevisionCompleted,
                    // The entry stands in for the material so each revision has its own cooldown.
                    material_id: Some(entry.id),
                    student_id,
                    topic_id: Some(entry.topic_id),
                    score: None,
                },
                now,
            )
            .await;
        let award = match granted {
            Ok(award) => award,
            Err(e) => {
                if let Err(reopen) = self.db.reopen_revision(entry_id).await {
                    warn!("Failed to reopen revision {}: {:?}", entry_id, reopen);
                }
                return Err(e);
            }
        };

        Ok(CompletedRevision { entry, award })
    }
}
