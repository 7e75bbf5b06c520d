pub mod domain;
pub mod gate;
pub mod leaderboard;
pub mod materials;
pub mod mentors;
pub mod ports;
pub mod profiles;
pub mod revision;
pub mod xp;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use domain::{
    LevelSystem, MaterialType, MentorAssignment, MentorProfile, NewStudyMaterial, Profile,
    ProfileUpdate, RevisionScheduleEntry, Role, StudentProfile, StudyMaterial, UserCredentials,
    XpEvent,
};
pub use ports::{DatabaseService, LeaderboardRow, PortError, PortResult, StorageService};
pub use revision::{RevisionBucket, RevisionBuckets, RevisionScheduler, REVISION_INTERVALS_DAYS};
pub use xp::{AwardRequest, CooldownTable, XpAward, XpEngine, XpEventType, XpProgress};
