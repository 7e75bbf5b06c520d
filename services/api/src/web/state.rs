//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the identity attached to
//! authenticated requests.

use crate::config::Config;
use chrono::Duration;
use levelup_core::leaderboard::Leaderboard;
use levelup_core::materials::Materials;
use levelup_core::mentors::Mentoring;
use levelup_core::ports::{DatabaseService, StorageService};
use levelup_core::profiles::Profiles;
use levelup_core::{CooldownTable, RevisionScheduler, Role, XpEngine};
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub xp: Arc<XpEngine>,
    pub revisions: Arc<RevisionScheduler>,
    pub leaderboard: Arc<Leaderboard>,
    pub materials: Arc<Materials>,
    pub profiles: Arc<Profiles>,
    pub mentoring: Arc<Mentoring>,
}

impl AppState {
    /// Wires the core services on top of the given adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        let cooldowns = CooldownTable::new(Duration::seconds(config.xp_cooldown_secs));
        let xp = Arc::new(XpEngine::new(db.clone(), cooldowns));
        let revisions = Arc::new(RevisionScheduler::new(db.clone(), xp.clone()));
        Self {
            leaderboard: Arc::new(Leaderboard::new(db.clone())),
            materials: Arc::new(Materials::new(db.clone(), storage, revisions.clone())),
            profiles: Arc::new(Profiles::new(db.clone())),
            mentoring: Arc::new(Mentoring::new(db.clone())),
            xp,
            revisions,
            db,
            config,
        }
    }
}

//=========================================================================================
// CurrentUser (Specific to One Authenticated Request)
//=========================================================================================

/// Inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}
