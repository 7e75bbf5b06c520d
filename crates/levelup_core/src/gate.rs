//! crates/levelup_core/src/gate.rs
//!
//! Role gate: where each role lands after sign-in and who may reach what.

use crate::domain::Role;
use crate::ports::{PortError, PortResult};

pub fn landing_path(role: Role) -> &'static str {
    match role {
        Role::Student => "/student/dashboard",
        Role::Mentor => "/mentor/dashboard",
        Role::Admin => "/admin/dashboard",
    }
}

pub fn authorize(role: Role, allowed: &[Role]) -> PortResult<()> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(PortError::Forbidden(format!(
            "role '{}' may not access this resource",
            role
        )))
    }
}
