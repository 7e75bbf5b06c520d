//! crates/levelup_core/src/mentors.rs
//!
//! Student-to-mentor assignments. A student has at most one active mentor.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{MentorAssignment, Profile, Role};
use crate::ports::{optional, DatabaseService, PortError, PortResult};
use crate::xp::XpProgress;

#[derive(Debug, Clone)]
pub struct MentoredStudent {
    pub profile: Profile,
    pub progress: XpProgress,
}

pub struct Mentoring {
    db: Arc<dyn DatabaseService>,
}

impl Mentoring {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    async fn expect_role(&self, profile_id: Uuid, role: Role) -> PortResult<Profile> {
        let profile = self.db.get_profile(profile_id).await?;
        if profile.role != role {
            return Err(PortError::Invalid(format!(
                "profile {} is a {}, expected a {}",
                profile_id, profile.role, role
            )));
        }
        Ok(profile)
    }

    /// Links a student to a mentor, replacing any active link the student had.
    pub async fn assign(&self, student_id: Uuid, mentor_id: Uuid) -> PortResult<MentorAssignment> {
        self.expect_role(student_id, Role::Student).await?;
        self.expect_role(mentor_id, Role::Mentor).await?;

        let replaced = self.db.deactivate_assignments_for_student(student_id).await?;
        let assignment = self.db.create_assignment(student_id, mentor_id).await?;
        info!(
            "Student {} assigned to mentor {} ({} previous assignment(s) closed)",
            student_id, mentor_id, replaced
        );
        Ok(assignment)
    }

    pub async fn unassign(&self, assignment_id: Uuid) -> PortResult<()> {
        let assignment = self.db.get_assignment(assignment_id).await?;
        if !assignment.active {
            return Ok(());
        }
        self.db.deactivate_assignment(assignment_id).await
    }

    pub async fn students_of(&self, mentor_id: Uuid) -> PortResult<Vec<MentoredStudent>> {
        let profiles = self.db.list_active_students(mentor_id).await?;
        let mut students = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let total = optional(self.db.get_level_system(profile.id).await)?
                .map(|row| row.total_xp)
                .unwrap_or(0);
            students.push(MentoredStudent {
                profile,
                progress: XpProgress::from_total(total),
            });
        }
        Ok(students)
    }
}
