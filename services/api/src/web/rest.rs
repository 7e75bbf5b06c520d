//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, shared by the
//! Swagger UI and the `openapi` binary.

use utoipa::OpenApi;

use crate::web::{auth, leaderboard, materials, mentoring, profile, revisions, xp};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::session_handler,
        auth::change_password_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        xp::award_xp_handler,
        xp::progress_handler,
        xp::history_handler,
        revisions::list_revisions_handler,
        revisions::complete_revision_handler,
        leaderboard::leaderboard_handler,
        leaderboard::my_standing_handler,
        materials::list_materials_handler,
        materials::open_material_handler,
        materials::create_material_handler,
        materials::delete_material_handler,
        mentoring::my_students_handler,
        mentoring::list_profiles_handler,
        mentoring::change_role_handler,
        mentoring::assign_mentor_handler,
        mentoring::unassign_mentor_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::ChangePasswordRequest,
            auth::AuthResponse,
            auth::SessionResponse,
            profile::ProfileResponse,
            profile::ProfileDetailsResponse,
            profile::UpdateProfileRequest,
            xp::AwardXpRequest,
            xp::AwardXpResponse,
            xp::ProgressResponse,
            xp::XpEventResponse,
            revisions::RevisionEntryResponse,
            revisions::RevisionBucketsResponse,
            revisions::CompleteRevisionResponse,
            leaderboard::LeaderboardEntryResponse,
            leaderboard::StandingResponse,
            materials::MaterialResponse,
            materials::OpenMaterialResponse,
            materials::UploadMaterialForm,
            mentoring::MentoredStudentResponse,
            mentoring::ChangeRoleRequest,
            mentoring::AssignMentorRequest,
            mentoring::AssignmentResponse,
        )
    ),
    tags(
        (name = "LevelUp API", description = "Study materials, XP, revisions and leaderboards for students, mentors and admins.")
    )
)]
pub struct ApiDoc;
