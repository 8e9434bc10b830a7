//! The authenticated identity of a request and its extractors.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::jwt::{AccessClaims, TokenError};

/// Identity resolved from a valid access token. Lives for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrincipalDetails {
    pub user_id: i64,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl TryFrom<&AccessClaims> for PrincipalDetails {
    type Error = TokenError;

    fn try_from(claims: &AccessClaims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.user_id()?,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

/// Why a presented access token was not accepted.
/// Recorded by the security filter so the rejection can name the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Expired,
    Invalid,
    WrongType,
}

impl From<&TokenError> for AuthFailure {
    fn from(e: &TokenError) -> Self {
        match e {
            TokenError::Expired => Self::Expired,
            TokenError::WrongType => Self::WrongType,
            _ => Self::Invalid,
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        let cause = match failure {
            AuthFailure::Expired => TokenError::Expired,
            AuthFailure::Invalid => TokenError::Invalid,
            AuthFailure::WrongType => TokenError::WrongType,
        };
        AppError::TokenInvalid(cause)
    }
}

/// The rejection for a request without a usable principal.
pub(super) fn authentication_error(extensions: &axum::http::Extensions) -> AppError {
    match extensions.get::<AuthFailure>() {
        Some(failure) => AppError::from(*failure),
        None => AppError::AuthenticationRequired,
    }
}

/// Extractor for handlers that need the caller's identity.
pub struct Principal(pub PrincipalDetails);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PrincipalDetails>()
            .copied()
            .map(Principal)
            .ok_or_else(|| authentication_error(&parts.extensions))
    }
}

/// Optional identity extractor, never fails.
pub struct OptionalPrincipal(pub Option<PrincipalDetails>);

impl<S> FromRequestParts<S> for OptionalPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalPrincipal(
            parts.extensions.get::<PrincipalDetails>().copied(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts() -> Parts {
        Request::builder().body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_principal_present() {
        let mut parts = parts();
        let details = PrincipalDetails {
            user_id: 1,
            issued_at: 10,
            expires_at: 20,
        };
        parts.extensions.insert(details);

        let Principal(found) = Principal::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found, details);

        let OptionalPrincipal(found) = OptionalPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found, Some(details));
    }

    #[tokio::test]
    async fn test_missing_principal_rejections() {
        let mut parts = parts();
        let err = Principal::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::AuthenticationRequired));

        parts.extensions.insert(AuthFailure::Expired);
        let err = Principal::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::TokenInvalid(TokenError::Expired)));
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(AuthFailure::from(&TokenError::Expired), AuthFailure::Expired);
        assert_eq!(AuthFailure::from(&TokenError::Revoked), AuthFailure::Invalid);
        assert_eq!(
            AuthFailure::from(&TokenError::WrongType),
            AuthFailure::WrongType
        );
    }
}
