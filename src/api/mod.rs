mod announcements;
mod applications;
mod auth;
mod extract;
mod resumes;
mod teams;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::db::Database;
use crate::oauth::IdentityProvider;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    auth: AuthService,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    secure_cookies: bool,
) -> Router {
    let auth_state = auth::AuthState {
        auth,
        identity_provider,
        secure_cookies,
    };

    let users_state = users::UsersState { db: db.clone() };

    let teams_state = teams::TeamsState { db: db.clone() };

    let announcements_state = announcements::AnnouncementsState { db: db.clone() };

    let resumes_state = resumes::ResumesState { db: db.clone() };

    let applications_state = applications::ApplicationsState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/user", users::router(users_state))
        .nest(
            "/team",
            teams::router(teams_state).merge(announcements::team_router(announcements_state.clone())),
        )
        .nest("/announcement", announcements::router(announcements_state))
        .nest("/resume", resumes::router(resumes_state))
        .nest("/application", applications::router(applications_state))
}
