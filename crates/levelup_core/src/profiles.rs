//! crates/levelup_core/src/profiles.rs
//!
//! Profile reads and edits, and admin role management.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{MentorProfile, Profile, ProfileUpdate, Role, StudentProfile};
use crate::gate::authorize;
use crate::ports::{optional, DatabaseService, PortError, PortResult};

/// A profile together with its role-specific extension row, if one exists.
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub profile: Profile,
    pub student: Option<StudentProfile>,
    pub mentor: Option<MentorProfile>,
}

pub struct Profiles {
    db: Arc<dyn DatabaseService>,
}

impl Profiles {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn view(&self, profile_id: Uuid) -> PortResult<ProfileView> {
        let profile = self.db.get_profile(profile_id).await?;
        let (student, mentor) = match profile.role {
            Role::Student => (optional(self.db.get_student_profile(profile_id).await)?, None),
            Role::Mentor => (None, optional(self.db.get_mentor_profile(profile_id).await)?),
            Role::Admin => (None, None),
        };
        Ok(ProfileView {
            profile,
            student,
            mentor,
        })
    }

    /// Owners edit their own contact fields; admins may edit anyone's.
    pub async fn update(
        &self,
        actor_id: Uuid,
        actor_role: Role,
        target_id: Uuid,
        update: ProfileUpdate,
    ) -> PortResult<Profile> {
        if actor_id != target_id {
            authorize(actor_role, &[Role::Admin])?;
        }
        let full_name = match update.full_name {
            Some(name) if name.trim().is_empty() => {
                return Err(PortError::Invalid("full name must not be empty".to_string()))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let phone = update.phone.map(|p| p.trim().to_string());
        self.db
            .update_profile(target_id, &ProfileUpdate { full_name, phone })
            .await
    }

    pub async fn list(&self, actor_role: Role, role: Option<Role>) -> PortResult<Vec<Profile>> {
        authorize(actor_role, &[Role::Admin])?;
        self.db.list_profiles(role).await
    }

    pub async fn change_role(
        &self,
        actor_id: Uuid,
        actor_role: Role,
        target_id: Uuid,
        role: Role,
    ) -> PortResult<Profile> {
        authorize(actor_role, &[Role::Admin])?;
        if actor_id == target_id {
            return Err(PortError::Invalid("admins cannot change their own role".to_string()));
        }
        let profile = self.db.set_role(target_id, role).await?;
        info!("Profile {} is now {}", target_id, role);
        Ok(profile)
    }
}
