//! Per-request authentication gate.
//!
//! Runs before routing. A bearer token is validated at most once per request:
//! success stores a `PrincipalDetails` in the request extensions, failure
//! stores an `AuthFailure` instead. The request is then checked against the
//! `SecurityRules`, so protected handlers never run without a principal.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::principal::{AuthFailure, PrincipalDetails, authentication_error};
use super::provider::TokenProvider;
use super::rules::{AccessLevel, SecurityRules};

#[derive(Clone)]
pub struct SecurityState {
    pub provider: TokenProvider,
    pub rules: Arc<SecurityRules>,
}

pub async fn security_filter(
    State(state): State<SecurityState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = TokenProvider::resolve_access_token(request.headers()).map(str::to_owned);

    if let Some(token) = token {
        let principal = state
            .provider
            .validate_token(&token)
            .and_then(|claims| PrincipalDetails::try_from(&claims));

        match principal {
            Ok(principal) => {
                request.extensions_mut().insert(principal);
            }
            Err(e) => {
                debug!(error = %e, path = %request.uri().path(), "Rejected access token");
                request.extensions_mut().insert(AuthFailure::from(&e));
            }
        }
    }

    let level = state
        .rules
        .evaluate(request.method(), request.uri().path());

    if level == AccessLevel::Authenticated
        && request.extensions().get::<PrincipalDetails>().is_none()
    {
        return authentication_error(request.extensions()).into_response();
    }

    next.run(request).await
}
