use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::extract::{Json, Path};
use crate::auth::Principal;
use crate::db::{Database, User};
use crate::error::{AppError, ResultExt};

const MAX_NAME_CHARS: usize = 30;
const MAX_BIO_CHARS: usize = 500;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/{user_id}", get(get_user))
        .with_state(state)
}

/// The caller's own profile.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: i64,
    provider: String,
    email: Option<String>,
    name: String,
    bio: Option<String>,
    created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            provider: user.provider,
            email: user.email,
            name: user.name,
            bio: user.bio,
            created_at: user.created_at,
        }
    }
}

/// What other users may see.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicUserResponse {
    id: i64,
    name: String,
    bio: Option<String>,
    created_at: String,
}

impl From<User> for PublicUserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            bio: user.bio,
            created_at: user.created_at,
        }
    }
}

async fn load_user(db: &Database, user_id: i64) -> Result<User, AppError> {
    db.users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| AppError::not_found("User not found"))
}

async fn get_me(
    State(state): State<UsersState>,
    Principal(principal): Principal,
) -> Result<impl IntoResponse, AppError> {
    let user = load_user(&state.db, principal.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    name: String,
    bio: Option<String>,
}

async fn update_me(
    State(state): State<UsersState>,
    Principal(principal): Principal,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::bad_request(format!(
            "Name cannot be longer than {} characters",
            MAX_NAME_CHARS
        )));
    }

    let bio = payload
        .bio
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());
    if bio.is_some_and(|b| b.chars().count() > MAX_BIO_CHARS) {
        return Err(AppError::bad_request(format!(
            "Bio cannot be longer than {} characters",
            MAX_BIO_CHARS
        )));
    }

    let updated = state
        .db
        .users()
        .update_info(principal.user_id, name, bio)
        .await
        .db_err("Failed to update user")?;
    if !updated {
        return Err(AppError::not_found("User not found"));
    }

    let user = load_user(&state.db, principal.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

async fn get_user(
    State(state): State<UsersState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = load_user(&state.db, user_id).await?;
    Ok(Json(PublicUserResponse::from(user)))
}
