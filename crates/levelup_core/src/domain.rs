//! crates/levelup_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP representation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Roles
//=========================================================================================

/// The role a profile signs in with. Decides which pages and endpoints it may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Mentor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Mentor => "mentor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "mentor" => Ok(Role::Mentor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

//=========================================================================================
// Profiles
//=========================================================================================

/// Identity row shared by every role.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Student-only extension of a profile, keyed by profile id.
#[derive(Debug, Clone, Default)]
pub struct StudentProfile {
    pub profile_id: Uuid,
    pub grade: Option<String>,
    pub school: Option<String>,
}

/// Mentor-only extension of a profile, keyed by profile id.
#[derive(Debug, Clone, Default)]
pub struct MentorProfile {
    pub profile_id: Uuid,
    pub expertise: Option<String>,
    pub bio: Option<String>,
}

/// Contact fields a profile owner (or an admin) may change.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub profile_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
}

//=========================================================================================
// XP and levels
//=========================================================================================

/// Cumulative XP for one student. Only the XP engine writes it.
#[derive(Debug, Clone)]
pub struct LevelSystem {
    pub student_id: Uuid,
    pub total_xp: i64,
    pub level: i64,
    pub updated_at: DateTime<Utc>,
}

/// One immutable grant in the XP log.
#[derive(Debug, Clone)]
pub struct XpEvent {
    pub id: Uuid,
    pub student_id: Uuid,
    pub event_type: String,
    pub material_id: Option<Uuid>,
    pub topic_id: Option<Uuid>,
    pub xp_amount: i64,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Study materials and revisions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    Video,
    Notes,
    Flashcards,
    Test,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Video => "video",
            MaterialType::Notes => "notes",
            MaterialType::Flashcards => "flashcards",
            MaterialType::Test => "test",
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MaterialType::Video),
            "notes" => Ok(MaterialType::Notes),
            "flashcards" => Ok(MaterialType::Flashcards),
            "test" => Ok(MaterialType::Test),
            other => Err(format!("unknown material type '{}'", other)),
        }
    }
}

/// Content authored by a mentor or admin. Read-only for students.
#[derive(Debug, Clone)]
pub struct StudyMaterial {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub title: String,
    pub material_type: MaterialType,
    pub url: String,
    /// Bucket key of an uploaded file. `None` for external links.
    pub storage_key: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A material that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewStudyMaterial {
    pub topic_id: Uuid,
    pub title: String,
    pub material_type: MaterialType,
    pub url: String,
    pub storage_key: Option<String>,
    pub created_by: Uuid,
}

/// One spaced-repetition touchpoint for a (student, topic, material type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionScheduleEntry {
    pub id: Uuid,
    pub student_id: Uuid,
    pub topic_id: Uuid,
    pub material_type: MaterialType,
    /// Index into the fixed interval table.
    pub revision_number: i32,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// Mentoring
//=========================================================================================

#[derive(Debug, Clone)]
pub struct MentorAssignment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub mentor_id: Uuid,
    pub active: bool,
    pub assigned_at: DateTime<Utc>,
}
