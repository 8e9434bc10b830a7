//! Token endpoints.
//!
//! - POST `/reissue` - Exchange the refresh cookie for a new token pair
//! - POST `/logout` - Drop the stored refresh token and clear the cookie
//! - GET `/oauth2/authorize` - Redirect to the identity provider
//! - GET `/oauth2/callback` - Finish the OAuth2 login and issue a token pair

use axum::{
    Router,
    extract::State,
    http::{
        HeaderMap, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use super::extract::{Json, Query};
use crate::auth::{
    AuthService, OAUTH_STATE_COOKIE_NAME, TokenPair, TokenProvider, TokenResponse,
    clear_oauth_state_cookie, clear_refresh_cookie, get_cookie, oauth_state_cookie,
    refresh_cookie,
};
use crate::error::AppError;
use crate::oauth::{IdentityProvider, generate_state};

#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
    pub secure_cookies: bool,
}

impl AuthState {
    fn identity_provider(&self) -> Result<&dyn IdentityProvider, AppError> {
        self.identity_provider
            .as_deref()
            .ok_or_else(|| AppError::not_found("OAuth2 login is not configured"))
    }
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/reissue", post(reissue))
        .route("/logout", post(logout))
        .route("/oauth2/authorize", get(authorize))
        .route("/oauth2/callback", get(callback))
        .with_state(state)
}

/// Token pair body plus the matching refresh cookie.
fn issued(pair: &TokenPair, secure: bool) -> impl IntoResponse + use<> {
    (
        [(
            SET_COOKIE,
            refresh_cookie(&pair.refresh.token, pair.refresh.duration, secure),
        )],
        Json(TokenResponse::from(pair)),
    )
}

async fn reissue(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let refresh = TokenProvider::resolve_refresh_token(&headers);
    let pair = state.auth.reissue_token(refresh).await?;
    Ok(issued(&pair, state.secure_cookies))
}

async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .logout(
            TokenProvider::resolve_access_token(&headers),
            TokenProvider::resolve_refresh_token(&headers),
        )
        .await?;

    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
    ))
}

async fn authorize(State(state): State<AuthState>) -> Result<impl IntoResponse, AppError> {
    let provider = state.identity_provider()?;
    let csrf_state = generate_state();
    let location = provider.authorize_url(&csrf_state);

    Ok((
        StatusCode::SEE_OTHER,
        [
            (LOCATION, location),
            (
                SET_COOKIE,
                oauth_state_cookie(&csrf_state, state.secure_cookies),
            ),
        ],
    ))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    let provider = state.identity_provider()?;

    if let Some(reason) = params.error {
        warn!(provider = provider.name(), reason = %reason, "Authorization was denied");
        return Err(AppError::bad_request(format!(
            "Authorization failed: {}",
            reason
        )));
    }

    let expected = get_cookie(&headers, OAUTH_STATE_COOKIE_NAME).filter(|s| !s.is_empty());
    match (params.state.as_deref(), expected) {
        (Some(got), Some(expected)) if got == expected => {}
        _ => return Err(AppError::bad_request("OAuth2 state mismatch")),
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing authorization code"))?;

    let profile = provider.exchange_code(&code).await.map_err(|e| {
        error!(provider = provider.name(), error = %e, "OAuth2 code exchange failed");
        AppError::custom(StatusCode::BAD_GATEWAY, "Identity provider request failed")
    })?;

    let (_, pair) = state.auth.login_oauth2(&profile).await?;

    Ok((
        AppendHeaders([(SET_COOKIE, clear_oauth_state_cookie(state.secure_cookies))]),
        issued(&pair, state.secure_cookies),
    ))
}
