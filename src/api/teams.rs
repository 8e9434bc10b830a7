use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::extract::{Json, Path};
use crate::auth::Principal;
use crate::db::{Database, Team};
use crate::error::{AppError, ResultExt};

const MAX_TEAM_NAME_CHARS: usize = 50;

#[derive(Clone)]
pub struct TeamsState {
    pub db: Database,
}

pub fn router(state: TeamsState) -> Router {
    Router::new()
        .route("/", post(create_team))
        .route("/{team_id}", get(get_team))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TeamResponse {
    id: i64,
    name: String,
    leader_id: i64,
    created_at: String,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            id: team.id,
            name: team.name,
            leader_id: team.leader_id,
            created_at: team.created_at,
        }
    }
}

/// Load a team or fail with 404.
pub(super) async fn load_team(db: &Database, team_id: i64) -> Result<Team, AppError> {
    db.teams()
        .get_by_id(team_id)
        .await
        .db_err("Failed to load team")?
        .ok_or_else(|| AppError::not_found("Team not found"))
}

/// Load a team and require `user_id` to be its leader.
pub(super) async fn load_team_led_by(
    db: &Database,
    team_id: i64,
    user_id: i64,
) -> Result<Team, AppError> {
    let team = load_team(db, team_id).await?;
    if team.leader_id != user_id {
        return Err(AppError::forbidden("Only the team leader can do this"));
    }
    Ok(team)
}

#[derive(Deserialize)]
struct CreateTeamRequest {
    name: String,
}

async fn create_team(
    State(state): State<TeamsState>,
    Principal(principal): Principal,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Team name cannot be empty"));
    }
    if name.chars().count() > MAX_TEAM_NAME_CHARS {
        return Err(AppError::bad_request(format!(
            "Team name cannot be longer than {} characters",
            MAX_TEAM_NAME_CHARS
        )));
    }

    let team_id = state
        .db
        .teams()
        .create(name, principal.user_id)
        .await
        .db_err("Failed to create team")?;
    info!(team_id, leader_id = principal.user_id, "Team created");

    let team = load_team(&state.db, team_id).await?;
    Ok((StatusCode::CREATED, Json(TeamResponse::from(team))))
}

async fn get_team(
    State(state): State<TeamsState>,
    Path(team_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let team = load_team(&state.db, team_id).await?;
    Ok(Json(TeamResponse::from(team)))
}
