pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod error;
pub mod jwt;
pub mod oauth;

use api::create_api_router;
use auth::{AuthService, SecurityRules, SecurityState, TokenProvider, security_filter};
use axum::{Json, Router, middleware, routing::get};
use db::Database;
use error::{catch_panic, method_not_allowed, route_not_found};
use jwt::{ACCESS_TOKEN_DURATION_SECS, JwtConfig, REFRESH_TOKEN_DURATION_SECS};
use oauth::IdentityProvider;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: u64,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// OAuth2 provider used for login, if configured
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl ServerConfig {
    /// Config with default token lifetimes, insecure cookies and no OAuth2 provider.
    pub fn new(db: Database, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            access_token_ttl: ACCESS_TOKEN_DURATION_SECS,
            refresh_token_ttl: REFRESH_TOKEN_DURATION_SECS,
            secure_cookies: false,
            identity_provider: None,
        }
    }
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::with_durations(
        &config.jwt_secret,
        config.access_token_ttl,
        config.refresh_token_ttl,
    ));
    let provider = TokenProvider::new(jwt);
    let auth = AuthService::new(config.db.clone(), provider.clone());

    let api_router = create_api_router(
        config.db.clone(),
        auth,
        config.identity_provider.clone(),
        config.secure_cookies,
    );

    let security = SecurityState {
        provider,
        rules: Arc::new(SecurityRules::default()),
    };

    // The security filter runs before routing, so unknown paths are
    // authenticated like any other and only then reach the fallback.
    Router::new()
        .route("/", get(index))
        .nest("/api", api_router)
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(security, security_filter))
        .layer(middleware::from_fn(catch_panic))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
