pub mod auth;
pub mod leaderboard;
pub mod materials;
pub mod mentoring;
pub mod middleware;
pub mod profile;
pub mod rest;
pub mod revisions;
pub mod state;
pub mod xp;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::adapters::storage::FILES_ROUTE;
use middleware::{require_admin, require_auth, require_staff, require_student};
use state::AppState;

/// Largest accepted request body, sized for material uploads.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Builds the complete HTTP router: public auth routes, the authenticated API
/// split by role, and the static file bucket.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    let student_routes = Router::new()
        .route("/xp/award", post(xp::award_xp_handler))
        .route("/xp/progress", get(xp::progress_handler))
        .route("/xp/history", get(xp::history_handler))
        .route("/revisions", get(revisions::list_revisions_handler))
        .route(
            "/revisions/{id}/complete",
            post(revisions::complete_revision_handler),
        )
        .route("/leaderboard/me", get(leaderboard::my_standing_handler))
        .route_layer(axum_middleware::from_fn(require_student));

    let staff_routes = Router::new()
        .route("/mentor/students", get(mentoring::my_students_handler))
        .route_layer(axum_middleware::from_fn(require_staff));

    let admin_routes = Router::new()
        .route("/admin/profiles", get(mentoring::list_profiles_handler))
        .route("/admin/profiles/{id}/role", put(mentoring::change_role_handler))
        .route("/admin/assignments", post(mentoring::assign_mentor_handler))
        .route(
            "/admin/assignments/{id}",
            delete(mentoring::unassign_mentor_handler),
        )
        .route_layer(axum_middleware::from_fn(require_admin));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/session", get(auth::session_handler))
        .route("/auth/password", put(auth::change_password_handler))
        .route(
            "/profile",
            get(profile::get_profile_handler).put(profile::update_profile_handler),
        )
        .route("/leaderboard", get(leaderboard::leaderboard_handler))
        .route(
            "/materials",
            get(materials::list_materials_handler).merge(
                post(materials::create_material_handler)
                    .route_layer(axum_middleware::from_fn(require_staff)),
            ),
        )
        .route(
            "/materials/{id}",
            delete(materials::delete_material_handler)
                .route_layer(axum_middleware::from_fn(require_staff)),
        )
        .route("/materials/{id}/open", post(materials::open_material_handler))
        .merge(student_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(FILES_ROUTE, ServeDir::new(&state.config.storage_path))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
