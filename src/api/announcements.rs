//! Announcement endpoints.
//!
//! The public board lives under `/api/announcement`, everything scoped to a
//! team under `/api/team/{team_id}/announcement`. Unpublished announcements
//! are only visible to the team leader.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::extract::{Json, Path, Query};
use super::teams::{load_team, load_team_led_by};
use crate::auth::{OptionalPrincipal, Principal};
use crate::db::{
    Announcement, AnnouncementFilter, ApplicationState, ApplicationSummary, Database,
    NewAnnouncement, Occupation, Team,
};
use crate::error::{AppError, ResultExt};

const PAGE_SIZE: u32 = 12;
const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 5000;
const MAX_VACANCIES: i64 = 100;

#[derive(Clone)]
pub struct AnnouncementsState {
    pub db: Database,
}

/// Public board across all teams.
pub fn router(state: AnnouncementsState) -> Router {
    Router::new()
        .route("/", get(list_all))
        .with_state(state)
}

/// Routes nested under `/api/team`.
pub fn team_router(state: AnnouncementsState) -> Router {
    Router::new()
        .route(
            "/{team_id}/announcement",
            get(list_for_team).post(create_announcement),
        )
        .route(
            "/{team_id}/announcement/{announcement_id}",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
        .route(
            "/{team_id}/announcement/{announcement_id}/application",
            get(list_applications),
        )
        .route(
            "/{team_id}/announcement/{announcement_id}/application/{application_id}",
            put(decide_application),
        )
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementResponse {
    id: i64,
    team_id: i64,
    title: String,
    description: String,
    vacancies: i64,
    occupations: Vec<Occupation>,
    published: bool,
    published_at: Option<NaiveDateTime>,
    expired_at: NaiveDateTime,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<Announcement> for AnnouncementResponse {
    fn from(a: Announcement) -> Self {
        Self {
            id: a.id,
            team_id: a.team_id,
            title: a.title,
            description: a.description,
            vacancies: a.vacancies,
            occupations: a.occupations,
            published: a.published,
            published_at: a.published_at,
            expired_at: a.expired_at,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationSummaryResponse {
    id: i64,
    user_id: i64,
    user_name: String,
    resume_id: Option<i64>,
    resume_title: Option<String>,
    state: ApplicationState,
    created_at: NaiveDateTime,
}

impl From<ApplicationSummary> for ApplicationSummaryResponse {
    fn from(s: ApplicationSummary) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            user_name: s.user_name,
            resume_id: s.resume_id,
            resume_title: s.resume_title,
            state: s.state,
            created_at: s.created_at,
        }
    }
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    page: u32,
    published: Option<bool>,
    occupations: Option<String>,
}

impl ListQuery {
    /// Parse the comma-separated occupation list. Blank entries are skipped.
    fn occupations(&self) -> Result<Vec<Occupation>, AppError> {
        let Some(raw) = self.occupations.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Occupation>().map_err(AppError::bad_request))
            .collect()
    }

    /// The `published` filter a caller is allowed to apply.
    fn visible(&self, is_leader: bool) -> Result<Option<bool>, AppError> {
        match (is_leader, self.published) {
            (true, published) => Ok(published),
            (false, Some(false)) => Err(AppError::forbidden(
                "Only the team leader can see unpublished announcements",
            )),
            (false, _) => Ok(Some(true)),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementRequest {
    title: String,
    #[serde(default)]
    description: String,
    vacancies: i64,
    #[serde(default)]
    occupations: Vec<Occupation>,
    #[serde(default)]
    publish: bool,
    expired_at: NaiveDateTime,
}

impl AnnouncementRequest {
    fn validate(self) -> Result<NewAnnouncement, AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::bad_request("Title cannot be empty"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::bad_request(format!(
                "Title cannot be longer than {} characters",
                MAX_TITLE_CHARS
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AppError::bad_request(format!(
                "Description cannot be longer than {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
        if !(0..=MAX_VACANCIES).contains(&self.vacancies) {
            return Err(AppError::bad_request(format!(
                "Vacancies must be between 0 and {}",
                MAX_VACANCIES
            )));
        }
        if self.expired_at <= chrono::Utc::now().naive_utc() {
            return Err(AppError::bad_request("Expiry must be in the future"));
        }

        Ok(NewAnnouncement {
            title: title.to_string(),
            description: self.description,
            vacancies: self.vacancies,
            occupations: self.occupations,
            publish: self.publish,
            expired_at: self.expired_at,
        })
    }
}

/// Load an announcement that belongs to `team`, or 404.
async fn load_announcement(
    db: &Database,
    team: &Team,
    announcement_id: i64,
) -> Result<Announcement, AppError> {
    db.announcements()
        .get_by_id(announcement_id)
        .await
        .db_err("Failed to load announcement")?
        .filter(|a| a.team_id == team.id)
        .ok_or_else(|| AppError::not_found("Announcement not found"))
}

async fn list_all(
    State(state): State<AnnouncementsState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = AnnouncementFilter {
        team_id: None,
        published: query.visible(false)?,
        occupations: query.occupations()?,
    };

    let page = state
        .db
        .announcements()
        .list(&filter, query.page, PAGE_SIZE)
        .await
        .db_err("Failed to list announcements")?;
    Ok(Json(page.map(AnnouncementResponse::from)))
}

async fn list_for_team(
    State(state): State<AnnouncementsState>,
    OptionalPrincipal(principal): OptionalPrincipal,
    Path(team_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let team = load_team(&state.db, team_id).await?;
    let is_leader = principal.is_some_and(|p| p.user_id == team.leader_id);

    let filter = AnnouncementFilter {
        team_id: Some(team.id),
        published: query.visible(is_leader)?,
        occupations: query.occupations()?,
    };

    let page = state
        .db
        .announcements()
        .list(&filter, query.page, PAGE_SIZE)
        .await
        .db_err("Failed to list announcements")?;
    Ok(Json(page.map(AnnouncementResponse::from)))
}

async fn create_announcement(
    State(state): State<AnnouncementsState>,
    Principal(principal): Principal,
    Path(team_id): Path<i64>,
    Json(payload): Json<AnnouncementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let team = load_team_led_by(&state.db, team_id, principal.user_id).await?;
    let new = payload.validate()?;

    let announcement = state
        .db
        .announcements()
        .create(team.id, &new)
        .await
        .db_err("Failed to create announcement")?;
    info!(
        team_id = team.id,
        announcement_id = announcement.id,
        published = announcement.published,
        "Announcement created"
    );

    Ok((
        StatusCode::CREATED,
        Json(AnnouncementResponse::from(announcement)),
    ))
}

async fn get_announcement(
    State(state): State<AnnouncementsState>,
    OptionalPrincipal(principal): OptionalPrincipal,
    Path((team_id, announcement_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let team = load_team(&state.db, team_id).await?;
    let announcement = load_announcement(&state.db, &team, announcement_id).await?;

    let is_leader = principal.is_some_and(|p| p.user_id == team.leader_id);
    if !announcement.published && !is_leader {
        return Err(AppError::not_found("Announcement not found"));
    }

    Ok(Json(AnnouncementResponse::from(announcement)))
}

async fn update_announcement(
    State(state): State<AnnouncementsState>,
    Principal(principal): Principal,
    Path((team_id, announcement_id)): Path<(i64, i64)>,
    Json(payload): Json<AnnouncementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let team = load_team_led_by(&state.db, team_id, principal.user_id).await?;
    let announcement = load_announcement(&state.db, &team, announcement_id).await?;
    let update = payload.validate()?;

    let updated = state
        .db
        .announcements()
        .update(announcement.id, &update)
        .await
        .db_err("Failed to update announcement")?;
    if !updated {
        return Err(AppError::not_found("Announcement not found"));
    }

    let announcement = load_announcement(&state.db, &team, announcement_id).await?;
    Ok(Json(AnnouncementResponse::from(announcement)))
}

async fn delete_announcement(
    State(state): State<AnnouncementsState>,
    Principal(principal): Principal,
    Path((team_id, announcement_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let team = load_team_led_by(&state.db, team_id, principal.user_id).await?;
    let announcement = load_announcement(&state.db, &team, announcement_id).await?;

    state
        .db
        .announcements()
        .delete(announcement.id)
        .await
        .db_err("Failed to delete announcement")?;
    info!(team_id = team.id, announcement_id, "Announcement deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn list_applications(
    State(state): State<AnnouncementsState>,
    Principal(principal): Principal,
    Path((team_id, announcement_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let team = load_team_led_by(&state.db, team_id, principal.user_id).await?;
    let announcement = load_announcement(&state.db, &team, announcement_id).await?;

    let applications = state
        .db
        .applications()
        .list_by_announcement(announcement.id)
        .await
        .db_err("Failed to list applications")?;

    let response: Vec<ApplicationSummaryResponse> = applications
        .into_iter()
        .map(ApplicationSummaryResponse::from)
        .collect();
    Ok(Json(response))
}

#[derive(Deserialize)]
struct DecisionRequest {
    state: ApplicationState,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionResponse {
    id: i64,
    announcement_id: i64,
    state: ApplicationState,
}

async fn decide_application(
    State(state): State<AnnouncementsState>,
    Principal(principal): Principal,
    Path((team_id, announcement_id, application_id)): Path<(i64, i64, i64)>,
    Json(payload): Json<DecisionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.state == ApplicationState::Pending {
        return Err(AppError::bad_request(
            "An application can only be accepted or rejected",
        ));
    }

    let team = load_team_led_by(&state.db, team_id, principal.user_id).await?;
    let announcement = load_announcement(&state.db, &team, announcement_id).await?;

    let application = state
        .db
        .applications()
        .get_by_id(application_id)
        .await
        .db_err("Failed to load application")?
        .filter(|a| a.announcement_id == announcement.id)
        .ok_or_else(|| AppError::not_found("Application not found"))?;

    state
        .db
        .applications()
        .set_state(application.id, payload.state)
        .await
        .db_err("Failed to update application")?;
    info!(
        application_id,
        announcement_id,
        state = %payload.state,
        "Application decided"
    );

    Ok(Json(DecisionResponse {
        id: application.id,
        announcement_id: announcement.id,
        state: payload.state,
    }))
}
