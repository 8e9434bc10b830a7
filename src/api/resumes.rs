use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::extract::{Json, Path};
use crate::auth::Principal;
use crate::db::{Database, Resume};
use crate::error::{AppError, ResultExt};

const MAX_TITLE_CHARS: usize = 100;
const MAX_CONTENT_CHARS: usize = 20_000;

#[derive(Clone)]
pub struct ResumesState {
    pub db: Database,
}

pub fn router(state: ResumesState) -> Router {
    Router::new()
        .route("/", get(list_resumes).post(create_resume))
        .route("/{resume_id}", get(get_resume))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResumeResponse {
    id: i64,
    user_id: i64,
    title: String,
    content: String,
    created_at: String,
}

impl From<Resume> for ResumeResponse {
    fn from(r: Resume) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            content: r.content,
            created_at: r.created_at,
        }
    }
}

#[derive(Deserialize)]
struct CreateResumeRequest {
    title: String,
    #[serde(default)]
    content: String,
}

async fn create_resume(
    State(state): State<ResumesState>,
    Principal(principal): Principal,
    Json(payload): Json<CreateResumeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::bad_request(format!(
            "Title cannot be longer than {} characters",
            MAX_TITLE_CHARS
        )));
    }
    if payload.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::bad_request("Resume is too long"));
    }

    let resume = state
        .db
        .resumes()
        .create(principal.user_id, title, &payload.content)
        .await
        .db_err("Failed to create resume")?;

    Ok((StatusCode::CREATED, Json(ResumeResponse::from(resume))))
}

async fn list_resumes(
    State(state): State<ResumesState>,
    Principal(principal): Principal,
) -> Result<impl IntoResponse, AppError> {
    let resumes = state
        .db
        .resumes()
        .list_by_user(principal.user_id)
        .await
        .db_err("Failed to list resumes")?;

    let response: Vec<ResumeResponse> = resumes.into_iter().map(ResumeResponse::from).collect();
    Ok(Json(response))
}

async fn get_resume(
    State(state): State<ResumesState>,
    Principal(principal): Principal,
    Path(resume_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
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

    Ok(Json(ResumeResponse::from(resume)))
}
