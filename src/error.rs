//! Error translation shared by every layer.
//!
//! Handlers, extractors and the security pipeline return `AppError`; its
//! `IntoResponse` impl is the only place an error body is rendered, so every
//! failure reaches the client as `{"status": .., "message": ..}`.

use std::panic::AssertUnwindSafe;

use axum::{
    Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde::Serialize;
use tracing::error;

use crate::jwt::TokenError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, AppError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, AppError> {
        self.map_err(|e| AppError::db_error(msg, e))
    }
}

/// Every failure the API can report.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad signature, malformed, expired, wrong-type or revoked token
    #[error("{0}")]
    TokenInvalid(TokenError),
    /// No credential where one is required
    #[error("Authentication required")]
    AuthenticationRequired,
    /// Credential present but not allowed to act on the resource
    #[error("{0}")]
    AuthorizationDenied(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Any other status with a caller-facing message
    #[error("{message}")]
    Custom { status: StatusCode, message: String },
    /// Server fault; the detail is logged, never returned
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::AuthorizationDenied(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn custom(status: StatusCode, msg: impl Into<String>) -> Self {
        Self::Custom {
            status,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{}: {}", context, e))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TokenInvalid(_) | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Custom { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        if e.is_rejection() {
            Self::TokenInvalid(e)
        } else {
            Self::Internal(e.to_string())
        }
    }
}

/// Uniform error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::Internal(detail) => {
                error!("{}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                message,
            }),
        )
            .into_response()
    }
}

/// Fallback for requests that match no route.
pub async fn route_not_found(request: Request) -> AppError {
    AppError::not_found(format!(
        "No handler found for {} {}",
        request.method(),
        request.uri().path()
    ))
}

/// Fallback for a known path hit with a method it does not serve.
pub async fn method_not_allowed(request: Request) -> AppError {
    AppError::custom(
        StatusCode::METHOD_NOT_ALLOWED,
        format!(
            "Request method {} is not supported for {}",
            request.method(),
            request.uri().path()
        ),
    )
}

/// Middleware that turns a panicking handler into a 500 response.
pub async fn catch_panic(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            AppError::internal(format!("Handler panicked: {}", detail)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_token_error_renders_401_with_cause() {
        let response = AppError::from(TokenError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["status"], 401);
        assert_eq!(json["message"], "Token has expired");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = AppError::db_error("Failed to load user", "disk I/O error").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["status"], 500);
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_custom_status() {
        let response = AppError::custom(StatusCode::BAD_GATEWAY, "upstream failed").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = body_json(response).await;
        assert_eq!(json["status"], 502);
        assert_eq!(json["message"], "upstream failed");
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_500() {
        use axum::{Router, body::Body, middleware, routing::get};
        use tower::ServiceExt;

        async fn boom() -> &'static str {
            panic!("boom")
        }

        let app = Router::new()
            .route("/boom", get(boom))
            .fallback(route_not_found)
            .layer(middleware::from_fn(catch_panic));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Internal server error");

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["message"], "No handler found for GET /nope");
    }

    #[test]
    fn test_encoding_failures_are_internal() {
        assert!(matches!(
            AppError::from(TokenError::TimeError),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(TokenError::Invalid),
            AppError::TokenInvalid(TokenError::Invalid)
        ));
    }
}
