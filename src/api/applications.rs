use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::extract::{Json, Path, Query};
use crate::auth::Principal;
use crate::db::{ApplicationState, Database, MyApplication, TeamApplication};
use crate::error::{AppError, ResultExt};

const PAGE_SIZE: u32 = 10;

#[derive(Clone)]
pub struct ApplicationsState {
    pub db: Database,
}

pub fn router(state: ApplicationsState) -> Router {
    Router::new()
        .route("/", get(list_mine).post(apply))
        .route("/{application_id}", delete(cancel))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationResponse {
    id: i64,
    announcement_id: i64,
    user_id: i64,
    resume_id: Option<i64>,
    state: ApplicationState,
    created_at: NaiveDateTime,
}

impl From<TeamApplication> for ApplicationResponse {
    fn from(a: TeamApplication) -> Self {
        Self {
            id: a.id,
            announcement_id: a.announcement_id,
            user_id: a.user_id,
            resume_id: a.resume_id,
            state: a.state,
            created_at: a.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MyApplicationResponse {
    id: i64,
    announcement_id: i64,
    announcement_title: String,
    team_id: i64,
    team_name: String,
    resume_id: Option<i64>,
    state: ApplicationState,
    created_at: NaiveDateTime,
}

impl From<MyApplication> for MyApplicationResponse {
    fn from(a: MyApplication) -> Self {
        Self {
            id: a.id,
            announcement_id: a.announcement_id,
            announcement_title: a.announcement_title,
            team_id: a.team_id,
            team_name: a.team_name,
            resume_id: a.resume_id,
            state: a.state,
            created_at: a.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest {
    announcement_id: i64,
    resume_id: Option<i64>,
}

async fn apply(
    State(state): State<ApplicationsState>,
    Principal(principal): Principal,
    Json(payload): Json<ApplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let announcement = state
        .db
        .announcements()
        .get_by_id(payload.announcement_id)
        .await
        .db_err("Failed to load announcement")?
        .ok_or_else(|| AppError::not_found("Announcement not found"))?;

    if !announcement.is_open(chrono::Utc::now().naive_utc()) {
        return Err(AppError::bad_request(
            "Announcement is not accepting applications",
        ));
    }

    if let Some(resume_id) = payload.resume_id {
        let resume = state
            .db
            .resumes()
            .get_by_id(resume_id)
            .await
            .db_err("Failed to load resume")?
            .ok_or_else(|| AppError::not_found("Resume not found"))?;
        if resume.user_id != principal.user_id {
            return Err(AppError::forbidden("Not your resume"));
        }
    }

    let application = state
        .db
        .applications()
        .create(announcement.id, principal.user_id, payload.resume_id)
        .await
        .db_err("Failed to create application")?
        .ok_or_else(|| AppError::conflict("Already applied to this announcement"))?;
    info!(
        user_id = principal.user_id,
        announcement_id = announcement.id,
        application_id = application.id,
        "Application submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse::from(application)),
    ))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    page: u32,
    state: Option<ApplicationState>,
}

async fn list_mine(
    State(state): State<ApplicationsState>,
    Principal(principal): Principal,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .db
        .applications()
        .list_by_user(principal.user_id, query.state, query.page, PAGE_SIZE)
        .await
        .db_err("Failed to list applications")?;

    Ok(Json(page.map(MyApplicationResponse::from)))
}

async fn cancel(
    State(state): State<ApplicationsState>,
    Principal(principal): Principal,
    Path(application_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let application = state
        .db
        .applications()
        .get_by_id(application_id)
        .await
        .db_err("Failed to load application")?
        .ok_or_else(|| AppError::not_found("Application not found"))?;

    if application.user_id != principal.user_id {
        return Err(AppError::forbidden("Not your application"));
    }

    // The state may change between the load and the delete.
    let deleted = state
        .db
        .applications()
        .delete_pending(application.id)
        .await
        .db_err("Failed to delete application")?;
    if !deleted {
        return Err(AppError::bad_request(
            "Only pending applications can be cancelled",
        ));
    }

    info!(user_id = principal.user_id, application_id, "Application cancelled");
    Ok(StatusCode::NO_CONTENT)
}
