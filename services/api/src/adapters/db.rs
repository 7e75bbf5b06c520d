//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use levelup_core::domain::{
    LevelSystem, MaterialType, MentorAssignment, MentorProfile, NewStudyMaterial, Profile,
    ProfileUpdate, RevisionScheduleEntry, Role, StudentProfile, StudyMaterial, UserCredentials,
    XpEvent,
};
use levelup_core::ports::{DatabaseService, LeaderboardRow, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps `RowNotFound` to the benign `NotFound` case, everything else to `Unexpected`.
fn missing(what: &str, id: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> PortError {
    let label = format!("{} {} not found", what, id);
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(label),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse_role(raw: &str) -> PortResult<Role> {
    raw.parse::<Role>().map_err(PortError::Unexpected)
}

fn parse_material_type(raw: &str) -> PortResult<MaterialType> {
    raw.parse::<MaterialType>().map_err(PortError::Unexpected)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PROFILE_COLUMNS: &str = "id, email, full_name, phone, role, created_at";

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    email: String,
    full_name: String,
    phone: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        Ok(Profile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            phone: self.phone,
            role: parse_role(&self.role)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
    role: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            profile_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
            role: parse_role(&self.role)?,
        })
    }
}

#[derive(FromRow)]
struct StudentProfileRecord {
    profile_id: Uuid,
    grade: Option<String>,
    school: Option<String>,
}
impl StudentProfileRecord {
    fn to_domain(self) -> StudentProfile {
        StudentProfile {
            profile_id: self.profile_id,
            grade: self.grade,
            school: self.school,
        }
    }
}

#[derive(FromRow)]
struct MentorProfileRecord {
    profile_id: Uuid,
    expertise: Option<String>,
    bio: Option<String>,
}
impl MentorProfileRecord {
    fn to_domain(self) -> MentorProfile {
        MentorProfile {
            profile_id: self.profile_id,
            expertise: self.expertise,
            bio: self.bio,
        }
    }
}

#[derive(FromRow)]
struct LevelSystemRecord {
    student_id: Uuid,
    total_xp: i64,
    level: i64,
    updated_at: DateTime<Utc>,
}
impl LevelSystemRecord {
    fn to_domain(self) -> LevelSystem {
        LevelSystem {
            student_id: self.student_id,
            total_xp: self.total_xp,
            level: self.level,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct XpEventRecord {
    id: Uuid,
    student_id: Uuid,
    event_type: String,
    material_id: Option<Uuid>,
    topic_id: Option<Uuid>,
    xp_amount: i64,
    created_at: DateTime<Utc>,
}
impl XpEventRecord {
    fn to_domain(self) -> XpEvent {
        XpEvent {
            id: self.id,
            student_id: self.student_id,
            event_type: self.event_type,
            material_id: self.material_id,
            topic_id: self.topic_id,
            xp_amount: self.xp_amount,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LeaderboardRecord {
    student_id: Uuid,
    full_name: String,
    total_xp: i64,
    level: i64,
    updated_at: DateTime<Utc>,
}
impl LeaderboardRecord {
    fn to_domain(self) -> LeaderboardRow {
        LeaderboardRow {
            student_id: self.student_id,
            full_name: self.full_name,
            total_xp: self.total_xp,
            level: self.level,
            updated_at: self.updated_at,
        }
    }
}

const REVISION_COLUMNS: &str =
    "id, student_id, topic_id, material_type, revision_number, due_date, completed, completed_at";

#[derive(FromRow)]
struct RevisionRecord {
    id: Uuid,
    student_id: Uuid,
    topic_id: Uuid,
    material_type: String,
    revision_number: i32,
    due_date: NaiveDate,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
}
impl RevisionRecord {
    fn to_domain(self) -> PortResult<RevisionScheduleEntry> {
        Ok(RevisionScheduleEntry {
            id: self.id,
            student_id: self.student_id,
            topic_id: self.topic_id,
            material_type: parse_material_type(&self.material_type)?,
            revision_number: self.revision_number,
            due_date: self.due_date,
            completed: self.completed,
            completed_at: self.completed_at,
        })
    }
}

const MATERIAL_COLUMNS: &str =
    "id, topic_id, title, material_type, url, storage_key, created_by, created_at";

#[derive(FromRow)]
struct MaterialRecord {
    id: Uuid,
    topic_id: Uuid,
    title: String,
    material_type: String,
    url: String,
    storage_key: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}
impl MaterialRecord {
    fn to_domain(self) -> PortResult<StudyMaterial> {
        Ok(StudyMaterial {
            id: self.id,
            topic_id: self.topic_id,
            title: self.title,
            material_type: parse_material_type(&self.material_type)?,
            url: self.url,
            storage_key: self.storage_key,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

const ASSIGNMENT_COLUMNS: &str = "id, student_id, mentor_id, active, assigned_at";

#[derive(FromRow)]
struct AssignmentRecord {
    id: Uuid,
    student_id: Uuid,
    mentor_id: Uuid,
    active: bool,
    assigned_at: DateTime<Utc>,
}
impl AssignmentRecord {
    fn to_domain(self) -> MentorAssignment {
        MentorAssignment {
            id: self.id,
            student_id: self.student_id,
            mentor_id: self.mentor_id,
            active: self.active,
            assigned_at: self.assigned_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_profile(
        &self,
        email: &str,
        full_name: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<Profile> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "INSERT INTO profiles (id, email, full_name, role, hashed_password) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(full_name)
        .bind(role.as_str())
        .bind(hashed_password)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Invalid(format!("email {} is already registered", email))
            }
            _ => unexpected(e),
        })?;

        match role {
            Role::Student => {
                sqlx::query("INSERT INTO student_profiles (profile_id) VALUES ($1)")
                    .bind(record.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(unexpected)?;
            }
            Role::Mentor => {
                sqlx::query("INSERT INTO mentor_profiles (profile_id) VALUES ($1)")
                    .bind(record.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(unexpected)?;
            }
            Role::Admin => {}
        }

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, role FROM profiles WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("User", email))?
        .to_domain()
    }

    async fn get_credentials(&self, profile_id: Uuid) -> PortResult<UserCredentials> {
        sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, role FROM profiles WHERE id = $1",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("User", profile_id))?
        .to_domain()
    }

    async fn update_password(&self, profile_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE profiles SET hashed_password = $1 WHERE id = $2")
            .bind(hashed_password)
            .bind(profile_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", profile_id)));
        }
        Ok(())
    }

    async fn get_profile(&self, profile_id: Uuid) -> PortResult<Profile> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Profile", profile_id))?
        .to_domain()
    }

    async fn get_student_profile(&self, profile_id: Uuid) -> PortResult<StudentProfile> {
        let record = sqlx::query_as::<_, StudentProfileRecord>(
            "SELECT profile_id, grade, school FROM student_profiles WHERE profile_id = $1",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Student profile", profile_id))?;
        Ok(record.to_domain())
    }

    async fn get_mentor_profile(&self, profile_id: Uuid) -> PortResult<MentorProfile> {
        let record = sqlx::query_as::<_, MentorProfileRecord>(
            "SELECT profile_id, expertise, bio FROM mentor_profiles WHERE profile_id = $1",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Mentor profile", profile_id))?;
        Ok(record.to_domain())
    }

    async fn update_profile(
        &self,
        profile_id: Uuid,
        update: &ProfileUpdate,
    ) -> PortResult<Profile> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET full_name = COALESCE($1, full_name), phone = COALESCE($2, phone) \
             WHERE id = $3 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(update.full_name.as_deref())
        .bind(update.phone.as_deref())
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Profile", profile_id))?
        .to_domain()
    }

    async fn list_profiles(&self, role: Option<Role>) -> PortResult<Vec<Profile>> {
        let records = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE ($1::TEXT IS NULL OR role = $1) ORDER BY created_at ASC",
            PROFILE_COLUMNS
        ))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn set_role(&self, profile_id: Uuid, role: Role) -> PortResult<Profile> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET role = $1 WHERE id = $2 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(role.as_str())
        .bind(profile_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(missing("Profile", profile_id))?;

        // The extension row for the new role is created on demand.
        let extension = match role {
            Role::Student => {
                Some("INSERT INTO student_profiles (profile_id) VALUES ($1) ON CONFLICT DO NOTHING")
            }
            Role::Mentor => {
                Some("INSERT INTO mentor_profiles (profile_id) VALUES ($1) ON CONFLICT DO NOTHING")
            }
            Role::Admin => None,
        };
        if let Some(sql) = extension {
            sqlx::query(sql)
                .bind(profile_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        profile_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, profile_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(profile_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let profile_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT profile_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        profile_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_level_system(&self, student_id: Uuid) -> PortResult<LevelSystem> {
        let record = sqlx::query_as::<_, LevelSystemRecord>(
            "SELECT student_id, total_xp, level, updated_at FROM level_systems WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Level system for", student_id))?;
        Ok(record.to_domain())
    }

    async fn add_xp(
        &self,
        student_id: Uuid,
        amount: i64,
        at: DateTime<Utc>,
    ) -> PortResult<LevelSystem> {
        let record = sqlx::query_as::<_, LevelSystemRecord>(
            "INSERT INTO level_systems (student_id, total_xp, level, updated_at) \
             VALUES ($1, $2, $2 / 1000 + 1, $3) \
             ON CONFLICT (student_id) DO UPDATE \
             SET total_xp = level_systems.total_xp + EXCLUDED.total_xp, \
                 level = (level_systems.total_xp + EXCLUDED.total_xp) / 1000 + 1, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING student_id, total_xp, level, updated_at",
        )
        .bind(student_id)
        .bind(amount)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn insert_xp_event(&self, event: &XpEvent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO xp_events (id, student_id, event_type, material_id, topic_id, xp_amount, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(event.id)
        .bind(event.student_id)
        .bind(&event.event_type)
        .bind(event.material_id)
        .bind(event.topic_id)
        .bind(event.xp_amount)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_xp_events(&self, student_id: Uuid, limit: i64) -> PortResult<Vec<XpEvent>> {
        let records = sqlx::query_as::<_, XpEventRecord>(
            "SELECT id, student_id, event_type, material_id, topic_id, xp_amount, created_at \
             FROM xp_events WHERE student_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_leaderboard(&self, limit: i64) -> PortResult<Vec<LeaderboardRow>> {
        let records = sqlx::query_as::<_, LeaderboardRecord>(
            "SELECT l.student_id, p.full_name, l.total_xp, l.level, l.updated_at \
             FROM level_systems l JOIN profiles p ON p.id = l.student_id \
             WHERE p.role = 'student' \
             ORDER BY l.total_xp DESC, l.updated_at ASC, l.student_id ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn count_students_above(&self, total_xp: i64) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM level_systems l JOIN profiles p ON p.id = l.student_id \
             WHERE p.role = 'student' AND l.total_xp > $1",
        )
        .bind(total_xp)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn list_revision_entries(
        &self,
        student_id: Uuid,
    ) -> PortResult<Vec<RevisionScheduleEntry>> {
        let records = sqlx::query_as::<_, RevisionRecord>(&format!(
            "SELECT {} FROM revision_schedule WHERE student_id = $1 ORDER BY due_date ASC",
            REVISION_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_revision_entries_for(
        &self,
        student_id: Uuid,
        topic_id: Uuid,
        material_type: MaterialType,
    ) -> PortResult<Vec<RevisionScheduleEntry>> {
        let records = sqlx::query_as::<_, RevisionRecord>(&format!(
            "SELECT {} FROM revision_schedule \
             WHERE student_id = $1 AND topic_id = $2 AND material_type = $3 \
             ORDER BY revision_number ASC",
            REVISION_COLUMNS
        ))
        .bind(student_id)
        .bind(topic_id)
        .bind(material_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_revision_entries(&self, entries: &[RevisionScheduleEntry]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for entry in entries {
            // A concurrent first open may have scheduled the same revision already.
            sqlx::query(
                "INSERT INTO revision_schedule \
                 (id, student_id, topic_id, material_type, revision_number, due_date, completed, completed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (student_id, topic_id, material_type, revision_number) DO NOTHING",
            )
            .bind(entry.id)
            .bind(entry.student_id)
            .bind(entry.topic_id)
            .bind(entry.material_type.as_str())
            .bind(entry.revision_number)
            .bind(entry.due_date)
            .bind(entry.completed)
            .bind(entry.completed_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn get_revision_entry(&self, entry_id: Uuid) -> PortResult<RevisionScheduleEntry> {
        sqlx::query_as::<_, RevisionRecord>(&format!(
            "SELECT {} FROM revision_schedule WHERE id = $1",
            REVISION_COLUMNS
        ))
        .bind(entry_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Revision", entry_id))?
        .to_domain()
    }

    async fn mark_revision_completed(
        &self,
        entry_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE revision_schedule SET completed = TRUE, completed_at = $1 \
             WHERE id = $2 AND completed = FALSE",
        )
        .bind(completed_at)
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::Invalid(format!(
                "revision {} is already completed",
                entry_id
            )));
        }
        Ok(())
    }

    async fn reopen_revision(&self, entry_id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE revision_schedule SET completed = FALSE, completed_at = NULL WHERE id = $1",
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Revision {} not found", entry_id)));
        }
        Ok(())
    }

    async fn list_materials(
        &self,
        topic_id: Option<Uuid>,
        material_type: Option<MaterialType>,
    ) -> PortResult<Vec<StudyMaterial>> {
        let records = sqlx::query_as::<_, MaterialRecord>(&format!(
            "SELECT {} FROM study_materials \
             WHERE ($1::UUID IS NULL OR topic_id = $1) AND ($2::TEXT IS NULL OR material_type = $2) \
             ORDER BY created_at DESC",
            MATERIAL_COLUMNS
        ))
        .bind(topic_id)
        .bind(material_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_material(&self, material_id: Uuid) -> PortResult<StudyMaterial> {
        sqlx::query_as::<_, MaterialRecord>(&format!(
            "SELECT {} FROM study_materials WHERE id = $1",
            MATERIAL_COLUMNS
        ))
        .bind(material_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Material", material_id))?
        .to_domain()
    }

    async fn create_material(&self, material: &NewStudyMaterial) -> PortResult<StudyMaterial> {
        sqlx::query_as::<_, MaterialRecord>(&format!(
            "INSERT INTO study_materials (id, topic_id, title, material_type, url, storage_key, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            MATERIAL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(material.topic_id)
        .bind(&material.title)
        .bind(material.material_type.as_str())
        .bind(&material.url)
        .bind(&material.storage_key)
        .bind(material.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn delete_material(&self, material_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM study_materials WHERE id = $1")
            .bind(material_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Material {} not found", material_id)));
        }
        Ok(())
    }

    async fn create_assignment(
        &self,
        student_id: Uuid,
        mentor_id: Uuid,
    ) -> PortResult<MentorAssignment> {
        let record = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "INSERT INTO mentor_assignments (id, student_id, mentor_id) VALUES ($1, $2, $3) RETURNING {}",
            ASSIGNMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(mentor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_assignment(&self, assignment_id: Uuid) -> PortResult<MentorAssignment> {
        let record = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "SELECT {} FROM mentor_assignments WHERE id = $1",
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing("Assignment", assignment_id))?;
        Ok(record.to_domain())
    }

    async fn deactivate_assignments_for_student(&self, student_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE mentor_assignments SET active = FALSE WHERE student_id = $1 AND active",
        )
        .bind(student_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn deactivate_assignment(&self, assignment_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE mentor_assignments SET active = FALSE WHERE id = $1")
            .bind(assignment_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_active_students(&self, mentor_id: Uuid) -> PortResult<Vec<Profile>> {
        let records = sqlx::query_as::<_, ProfileRecord>(
            "SELECT p.id, p.email, p.full_name, p.phone, p.role, p.created_at \
             FROM mentor_assignments a JOIN profiles p ON p.id = a.student_id \
             WHERE a.mentor_id = $1 AND a.active ORDER BY p.full_name ASC",
        )
        .bind(mentor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}
