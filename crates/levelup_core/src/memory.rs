//! crates/levelup_core/src/memory.rs
//!
//! In-memory port implementations used by tests in this crate and in the API service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    LevelSystem, MaterialType, MentorAssignment, MentorProfile, NewStudyMaterial, Profile,
    ProfileUpdate, RevisionScheduleEntry, Role, StudentProfile, StudyMaterial, UserCredentials,
    XpEvent,
};
use crate::ports::{DatabaseService, LeaderboardRow, PortError, PortResult, StorageService};
use crate::xp::level_for;

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    passwords: HashMap<Uuid, String>,
    students: HashMap<Uuid, StudentProfile>,
    mentors: HashMap<Uuid, MentorProfile>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    levels: HashMap<Uuid, LevelSystem>,
    events: Vec<XpEvent>,
    revisions: Vec<RevisionScheduleEntry>,
    materials: Vec<StudyMaterial>,
    assignments: Vec<MentorAssignment>,
}

/// A `DatabaseService` backed by hash maps, with switches to simulate write failures.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    pub fail_level_upserts: AtomicBool,
    pub fail_event_inserts: AtomicBool,
    pub fail_material_inserts: AtomicBool,
    /// Makes the next per-topic revision lookup come back empty, as if another
    /// request inserted the rows right after it.
    pub miss_next_revision_read: AtomicBool,
}

fn not_found(what: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", what, id))
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn xp_events(&self) -> Vec<XpEvent> {
        self.tables().events.clone()
    }

    pub fn level_row(&self, student_id: Uuid) -> Option<LevelSystem> {
        self.tables().levels.get(&student_id).cloned()
    }

    fn credentials_of(tables: &Tables, profile: &Profile) -> PortResult<UserCredentials> {
        let hashed_password = tables
            .passwords
            .get(&profile.id)
            .cloned()
            .ok_or_else(|| not_found("Credentials for", profile.id))?;
        Ok(UserCredentials {
            profile_id: profile.id,
            email: profile.email.clone(),
            hashed_password,
            role: profile.role,
        })
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_profile(
        &self,
        email: &str,
        full_name: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<Profile> {
        let mut tables = self.tables();
        if tables.profiles.values().any(|p| p.email == email) {
            return Err(PortError::Invalid(format!("email {} is already registered", email)));
        }
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            phone: None,
            role,
            created_at: Utc::now(),
        };
        tables.passwords.insert(profile.id, hashed_password.to_string());
        match role {
            Role::Student => {
                tables.students.insert(
                    profile.id,
                    StudentProfile {
                        profile_id: profile.id,
                        ..Default::default()
                    },
                );
            }
            Role::Mentor => {
                tables.mentors.insert(
                    profile.id,
                    MentorProfile {
                        profile_id: profile.id,
                        ..Default::default()
                    },
                );
            }
            Role::Admin => {}
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables();
        let profile = tables
            .profiles
            .values()
            .find(|p| p.email == email)
            .ok_or_else(|| not_found("User", email))?;
        Self::credentials_of(&tables, profile)
    }

    async fn get_credentials(&self, profile_id: Uuid) -> PortResult<UserCredentials> {
        let tables = self.tables();
        let profile = tables
            .profiles
            .get(&profile_id)
            .ok_or_else(|| not_found("User", profile_id))?;
        Self::credentials_of(&tables, profile)
    }

    async fn update_password(&self, profile_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let mut tables = self.tables();
        match tables.passwords.get_mut(&profile_id) {
            Some(hash) => {
                *hash = hashed_password.to_string();
                Ok(())
            }
            None => Err(not_found("User", profile_id)),
        }
    }

    async fn get_profile(&self, profile_id: Uuid) -> PortResult<Profile> {
        self.tables()
            .profiles
            .get(&profile_id)
            .cloned()
            .ok_or_else(|| not_found("Profile", profile_id))
    }

    async fn get_student_profile(&self, profile_id: Uuid) -> PortResult<StudentProfile> {
        self.tables()
            .students
            .get(&profile_id)
            .cloned()
            .ok_or_else(|| not_found("Student profile", profile_id))
    }

    async fn get_mentor_profile(&self, profile_id: Uuid) -> PortResult<MentorProfile> {
        self.tables()
            .mentors
            .get(&profile_id)
            .cloned()
            .ok_or_else(|| not_found("Mentor profile", profile_id))
    }

    async fn update_profile(
        &self,
        profile_id: Uuid,
        update: &ProfileUpdate,
    ) -> PortResult<Profile> {
        let mut tables = self.tables();
        let profile = tables
            .profiles
            .get_mut(&profile_id)
            .ok_or_else(|| not_found("Profile", profile_id))?;
        if let Some(name) = &update.full_name {
            profile.full_name = name.clone();
        }
        if let Some(phone) = &update.phone {
            profile.phone = Some(phone.clone());
        }
        Ok(profile.clone())
    }

    async fn list_profiles(&self, role: Option<Role>) -> PortResult<Vec<Profile>> {
        let mut profiles: Vec<Profile> = self
            .tables()
            .profiles
            .values()
            .filter(|p| role.map_or(true, |r| p.role == r))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(profiles)
    }

    async fn set_role(&self, profile_id: Uuid, role: Role) -> PortResult<Profile> {
        let mut tables = self.tables();
        let profile = tables
            .profiles
            .get_mut(&profile_id)
            .ok_or_else(|| not_found("Profile", profile_id))?;
        profile.role = role;
        Ok(profile.clone())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        profile_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()
            .sessions
            .insert(session_id.to_string(), (profile_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.tables().sessions.get(session_id) {
            Some((profile_id, expires_at)) if *expires_at > Utc::now() => Ok(*profile_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables().sessions.remove(session_id);
        Ok(())
    }

    async fn get_level_system(&self, student_id: Uuid) -> PortResult<LevelSystem> {
        self.tables()
            .levels
            .get(&student_id)
            .cloned()
            .ok_or_else(|| not_found("Level system for", student_id))
    }

    async fn add_xp(
        &self,
        student_id: Uuid,
        amount: i64,
        at: DateTime<Utc>,
    ) -> PortResult<LevelSystem> {
        if self.fail_level_upserts.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("level upsert failed".to_string()));
        }
        let mut tables = self.tables();
        let row = tables.levels.entry(student_id).or_insert(LevelSystem {
            student_id,
            total_xp: 0,
            level: 1,
            updated_at: at,
        });
        row.total_xp += amount;
        row.level = level_for(row.total_xp);
        row.updated_at = at;
        Ok(row.clone())
    }

    async fn insert_xp_event(&self, event: &XpEvent) -> PortResult<()> {
        if self.fail_event_inserts.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("event insert failed".to_string()));
        }
        self.tables().events.push(event.clone());
        Ok(())
    }

    async fn list_xp_events(&self, student_id: Uuid, limit: i64) -> PortResult<Vec<XpEvent>> {
        let tables = self.tables();
        Ok(tables
            .events
            .iter()
            .rev()
            .filter(|e| e.student_id == student_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_leaderboard(&self, limit: i64) -> PortResult<Vec<LeaderboardRow>> {
        let tables = self.tables();
        let mut rows: Vec<LeaderboardRow> = tables
            .levels
            .values()
            .filter_map(|level| {
                let profile = tables.profiles.get(&level.student_id)?;
                Some(LeaderboardRow {
                    student_id: level.student_id,
                    full_name: profile.full_name.clone(),
                    total_xp: level.total_xp,
                    level: level.level,
                    updated_at: level.updated_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_xp
                .cmp(&a.total_xp)
                .then(a.updated_at.cmp(&b.updated_at))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn count_students_above(&self, total_xp: i64) -> PortResult<i64> {
        Ok(self
            .tables()
            .levels
            .values()
            .filter(|l| l.total_xp > total_xp)
            .count() as i64)
    }

    async fn list_revision_entries(
        &self,
        student_id: Uuid,
    ) -> PortResult<Vec<RevisionScheduleEntry>> {
        Ok(self
            .tables()
            .revisions
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn list_revision_entries_for(
        &self,
        student_id: Uuid,
        topic_id: Uuid,
        material_type: MaterialType,
    ) -> PortResult<Vec<RevisionScheduleEntry>> {
        if self.miss_next_revision_read.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self
            .tables()
            .revisions
            .iter()
            .filter(|e| {
                e.student_id == student_id
                    && e.topic_id == topic_id
                    && e.material_type == material_type
            })
            .cloned()
            .collect())
    }

    async fn insert_revision_entries(&self, entries: &[RevisionScheduleEntry]) -> PortResult<()> {
        let mut tables = self.tables();
        for entry in entries {
            let taken = tables.revisions.iter().any(|e| {
                e.student_id == entry.student_id
                    && e.topic_id == entry.topic_id
                    && e.material_type == entry.material_type
                    && e.revision_number == entry.revision_number
            });
            if !taken {
                tables.revisions.push(entry.clone());
            }
        }
        Ok(())
    }

    async fn get_revision_entry(&self, entry_id: Uuid) -> PortResult<RevisionScheduleEntry> {
        self.tables()
            .revisions
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or_else(|| not_found("Revision", entry_id))
    }

    async fn mark_revision_completed(
        &self,
        entry_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables();
        let entry = tables
            .revisions
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| not_found("Revision", entry_id))?;
        if entry.completed {
            return Err(PortError::Invalid(format!(
                "revision {} is already completed",
                entry_id
            )));
        }
        entry.completed = true;
        entry.completed_at = Some(completed_at);
        Ok(())
    }

    async fn reopen_revision(&self, entry_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables();
        let entry = tables
            .revisions
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| not_found("Revision", entry_id))?;
        entry.completed = false;
        entry.completed_at = None;
        Ok(())
    }

    async fn list_materials(
        &self,
        topic_id: Option<Uuid>,
        material_type: Option<MaterialType>,
    ) -> PortResult<Vec<StudyMaterial>> {
        Ok(self
            .tables()
            .materials
            .iter()
            .filter(|m| topic_id.map_or(true, |t| m.topic_id == t))
            .filter(|m| material_type.map_or(true, |t| m.material_type == t))
            .cloned()
            .collect())
    }

    async fn get_material(&self, material_id: Uuid) -> PortResult<StudyMaterial> {
        self.tables()
            .materials
            .iter()
            .find(|m| m.id == material_id)
            .cloned()
            .ok_or_else(|| not_found("Material", material_id))
    }

    async fn create_material(&self, material: &NewStudyMaterial) -> PortResult<StudyMaterial> {
        if self.fail_material_inserts.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("material insert failed".to_string()));
        }
        let material = StudyMaterial {
            id: Uuid::new_v4(),
            topic_id: material.topic_id,
            title: material.title.clone(),
            material_type: material.material_type,
            url: material.url.clone(),
            storage_key: material.storage_key.clone(),
            created_by: material.created_by,
            created_at: Utc::now(),
        };
        self.tables().materials.push(material.clone());
        Ok(material)
    }

    async fn delete_material(&self, material_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables();
        let before = tables.materials.len();
        tables.materials.retain(|m| m.id != material_id);
        if tables.materials.len() == before {
            return Err(not_found("Material", material_id));
        }
        Ok(())
    }

    async fn create_assignment(
        &self,
        student_id: Uuid,
        mentor_id: Uuid,
    ) -> PortResult<MentorAssignment> {
        let assignment = MentorAssignment {
            id: Uuid::new_v4(),
            student_id,
            mentor_id,
            active: true,
            assigned_at: Utc::now(),
        };
        self.tables().assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn get_assignment(&self, assignment_id: Uuid) -> PortResult<MentorAssignment> {
        self.tables()
            .assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .cloned()
            .ok_or_else(|| not_found("Assignment", assignment_id))
    }

    async fn deactivate_assignments_for_student(&self, student_id: Uuid) -> PortResult<u64> {
        let mut changed = 0;
        for assignment in self
            .tables()
            .assignments
            .iter_mut()
            .filter(|a| a.student_id == student_id && a.active)
        {
            assignment.active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn deactivate_assignment(&self, assignment_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables();
        let assignment = tables
            .assignments
            .iter_mut()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| not_found("Assignment", assignment_id))?;
        assignment.active = false;
        Ok(())
    }

    async fn list_active_students(&self, mentor_id: Uuid) -> PortResult<Vec<Profile>> {
        let tables = self.tables();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.mentor_id == mentor_id && a.active)
            .filter_map(|a| tables.profiles.get(&a.student_id).cloned())
            .collect())
    }
}

/// A `StorageService` that keeps objects in a map and serves them from `mem://`.
#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

#[async_trait]
impl StorageService for InMemoryStorage {
    async fn put_object(&self, key: &str, data: &[u8]) -> PortResult<String> {
        self.objects().insert(key.to_string(), data.to_vec());
        Ok(format!("mem://{}", key))
    }

    async fn delete_object(&self, key: &str) -> PortResult<()> {
        self.objects().remove(key);
        Ok(())
    }
}
