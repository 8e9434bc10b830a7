//! Token pair issuance, validation and extraction from requests.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use serde::Serialize;

use super::cookie::{REFRESH_COOKIE_NAME, get_cookie};
use crate::jwt::{AccessClaims, IssuedToken, JwtConfig, RefreshClaims, TokenError};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Body returned by login, OAuth2 callback and reissue.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&TokenPair> for TokenResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access.token.clone(),
            refresh_token: pair.refresh.token.clone(),
        }
    }
}

/// Stateless token operations. Persisting the refresh token is the caller's job.
#[derive(Clone)]
pub struct TokenProvider {
    jwt: Arc<JwtConfig>,
}

impl TokenProvider {
    pub fn new(jwt: Arc<JwtConfig>) -> Self {
        Self { jwt }
    }

    /// Sign an access and a refresh token for `user_id`, both issued at the same instant.
    pub fn issue_token_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        let issued_at = crate::jwt::now()?;
        Ok(TokenPair {
            access: self.jwt.generate_access_token_at(user_id, issued_at)?,
            refresh: self.jwt.generate_refresh_token_at(user_id, issued_at)?,
        })
    }

    /// Check signature, expiry and type of an access token.
    pub fn validate_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.jwt.validate_access_token(token)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.jwt.validate_refresh_token(token)
    }

    /// Bearer token from the `Authorization` header.
    pub fn resolve_access_token(headers: &HeaderMap) -> Option<&str> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }

    pub fn resolve_refresh_token(headers: &HeaderMap) -> Option<&str> {
        get_cookie(headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty())
    }

    /// User id from whichever of the two tokens still carries a valid signature.
    /// Expiry is ignored, so an expired session can still be identified for logout.
    pub fn identify_ignoring_expiry(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Option<i64> {
        let from_access = access
            .and_then(|t| self.jwt.decode_access_token_ignoring_expiry(t).ok())
            .and_then(|claims| claims.user_id().ok());

        from_access.or_else(|| {
            refresh
                .and_then(|t| self.jwt.decode_refresh_token_ignoring_expiry(t).ok())
                .and_then(|claims| claims.user_id().ok())
        })
    }
}
