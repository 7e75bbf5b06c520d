//! crates/levelup_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete relational store and file bucket.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    LevelSystem, MaterialType, MentorAssignment, MentorProfile, NewStudyMaterial, Profile,
    ProfileUpdate, RevisionScheduleEntry, Role, StudentProfile, StudyMaterial, UserCredentials,
    XpEvent,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, disk).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The "missing row" case. Callers treat it as benign where a row is optional.
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Turns a `NotFound` into `None` and passes every other outcome through.
pub fn optional<T>(result: PortResult<T>) -> PortResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PortError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// A leaderboard row as read from storage, before ranks are assigned.
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub student_id: Uuid,
    pub full_name: String,
    pub total_xp: i64,
    pub level: i64,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles & Credentials ---
    /// Creates the profile row, its credential and the role-specific extension row.
    async fn create_profile(
        &self,
        email: &str,
        full_name: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<Profile>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_credentials(&self, profile_id: Uuid) -> PortResult<UserCredentials>;

    async fn update_password(&self, profile_id: Uuid, hashed_password: &str) -> PortResult<()>;

    async fn get_profile(&self, profile_id: Uuid) -> PortResult<Profile>;

    async fn get_student_profile(&self, profile_id: Uuid) -> PortResult<StudentProfile>;

    async fn get_mentor_profile(&self, profile_id: Uuid) -> PortResult<MentorProfile>;

    async fn update_profile(&self, profile_id: Uuid, update: &ProfileUpdate)
        -> PortResult<Profile>;

    async fn list_profiles(&self, role: Option<Role>) -> PortResult<Vec<Profile>>;

    async fn set_role(&self, profile_id: Uuid, role: Role) -> PortResult<Profile>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        profile_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning profile id of an unexpired session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Levels & XP ---
    async fn get_level_system(&self, student_id: Uuid) -> PortResult<LevelSystem>;

    /// Adds `amount` to a student's total in one atomic step, creating the row on
    /// first use, and returns the row as it stands afterwards.
    async fn add_xp(
        &self,
        student_id: Uuid,
        amount: i64,
        at: DateTime<Utc>,
    ) -> PortResult<LevelSystem>;

    async fn insert_xp_event(&self, event: &XpEvent) -> PortResult<()>;

    /// Most recent first.
    async fn list_xp_events(&self, student_id: Uuid, limit: i64) -> PortResult<Vec<XpEvent>>;

    /// Ordered by total XP descending, then by `updated_at` ascending.
    async fn list_leaderboard(&self, limit: i64) -> PortResult<Vec<LeaderboardRow>>;

    /// Number of students holding strictly more XP than `total_xp`.
    async fn count_students_above(&self, total_xp: i64) -> PortResult<i64>;

    // --- Revision Schedule ---
    async fn list_revision_entries(&self, student_id: Uuid)
        -> PortResult<Vec<RevisionScheduleEntry>>;

    async fn list_revision_entries_for(
        &self,
        student_id: Uuid,
        topic_id: Uuid,
        material_type: MaterialType,
    ) -> PortResult<Vec<RevisionScheduleEntry>>;

    /// Entries that collide with an existing (student, topic, type, number) are skipped.
    async fn insert_revision_entries(&self, entries: &[RevisionScheduleEntry]) -> PortResult<()>;

    async fn get_revision_entry(&self, entry_id: Uuid) -> PortResult<RevisionScheduleEntry>;

    /// Flips a pending entry to completed. `Invalid` if it was already completed.
    async fn mark_revision_completed(
        &self,
        entry_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Puts a completed entry back to pending.
    async fn reopen_revision(&self, entry_id: Uuid) -> PortResult<()>;

    // --- Study Materials ---
    async fn list_materials(
        &self,
        topic_id: Option<Uuid>,
        material_type: Option<MaterialType>,
    ) -> PortResult<Vec<StudyMaterial>>;

    async fn get_material(&self, material_id: Uuid) -> PortResult<StudyMaterial>;

    async fn create_material(&self, material: &NewStudyMaterial) -> PortResult<StudyMaterial>;

    async fn delete_material(&self, material_id: Uuid) -> PortResult<()>;

    // --- Mentor Assignments ---
    async fn create_assignment(&self, student_id: Uuid, mentor_id: Uuid)
        -> PortResult<MentorAssignment>;

    async fn get_assignment(&self, assignment_id: Uuid) -> PortResult<MentorAssignment>;

    /// Deactivates every active assignment of a student. Returns how many changed.
    async fn deactivate_assignments_for_student(&self, student_id: Uuid) -> PortResult<u64>;

    async fn deactivate_assignment(&self, assignment_id: Uuid) -> PortResult<()>;

    async fn list_active_students(&self, mentor_id: Uuid) -> PortResult<Vec<Profile>>;
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores an object under `key` and returns the public URL it is served from.
    async fn put_object(&self, key: &str, data: &[u8]) -> PortResult<String>;

    /// Removes an object. Removing a missing object is not an error.
    async fn delete_object(&self, key: &str) -> PortResult<()>;
}
