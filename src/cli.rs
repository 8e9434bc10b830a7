//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, MAX_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS};
use crate::oauth::{HttpIdentityProvider, IdentityProvider, OAuth2Settings};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "teamhire", about = "Team recruitment backend with JWT authentication")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "teamhire.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Public URL of the service. HTTPS enables Secure cookies
    #[arg(long, default_value = "http://localhost:8080")]
    pub public_url: String,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_DURATION_SECS, value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_DURATION_SECS))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_DURATION_SECS, value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_DURATION_SECS))]
    pub refresh_token_ttl: u64,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub oauth: OAuthArgs,
}

/// OAuth2 provider settings. Either all required ones are given or none.
#[derive(clap::Args, Debug, Clone)]
pub struct OAuthArgs {
    /// Name stored with users created through this provider
    #[arg(long, env = "OAUTH_PROVIDER_NAME", default_value = "oauth2")]
    pub oauth_provider_name: String,

    #[arg(long, env = "OAUTH_CLIENT_ID")]
    pub oauth_client_id: Option<String>,

    /// Prefer the OAUTH_CLIENT_SECRET env var
    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    pub oauth_client_secret: Option<String>,

    #[arg(long, env = "OAUTH_AUTHORIZE_URL")]
    pub oauth_authorize_url: Option<String>,

    #[arg(long, env = "OAUTH_TOKEN_URL")]
    pub oauth_token_url: Option<String>,

    #[arg(long, env = "OAUTH_USERINFO_URL")]
    pub oauth_userinfo_url: Option<String>,

    /// Callback URL registered with the provider.
    /// Defaults to {public-url}/api/auth/oauth2/callback
    #[arg(long, env = "OAUTH_REDIRECT_URL")]
    pub oauth_redirect_url: Option<String>,

    /// Space or comma separated scopes
    #[arg(long, env = "OAUTH_SCOPES", default_value = "openid email profile")]
    pub oauth_scopes: String,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the public URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_url(public_url: &str) -> Option<Url> {
    let url = match Url::parse(public_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %public_url, error = %e, "Invalid public URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = matches!(url.host_str(), Some("localhost" | "127.0.0.1"));

    if !is_https && !is_localhost {
        error!("public-url must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

fn parse_url(option: &str, value: &str) -> Result<Url, String> {
    Url::parse(value).map_err(|e| format!("Invalid --{} '{}': {}", option, value, e))
}

/// Resolve the OAuth2 settings.
/// Returns `Ok(None)` when no OAuth2 option is given at all.
pub fn build_oauth_settings(
    args: &OAuthArgs,
    public_url: &Url,
) -> Result<Option<OAuth2Settings>, String> {
    let (client_id, client_secret, authorize_url, token_url, userinfo_url) = match (
        &args.oauth_client_id,
        &args.oauth_client_secret,
        &args.oauth_authorize_url,
        &args.oauth_token_url,
        &args.oauth_userinfo_url,
    ) {
        (None, None, None, None, None) => return Ok(None),
        (Some(id), Some(secret), Some(authorize), Some(token), Some(userinfo)) => {
            (id, secret, authorize, token, userinfo)
        }
        _ => {
            return Err("Incomplete OAuth2 configuration: client id, client secret, \
                        authorize, token and userinfo URLs are all required"
                .to_string());
        }
    };

    let redirect_url = match args.oauth_redirect_url.as_deref() {
        Some(url) => parse_url("oauth-redirect-url", url)?,
        None => public_url
            .join("/api/auth/oauth2/callback")
            .map_err(|e| format!("Failed to derive OAuth2 redirect URL: {}", e))?,
    };

    let scopes = args
        .oauth_scopes
        .split([' ', ','])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Some(OAuth2Settings {
        provider_name: args.oauth_provider_name.clone(),
        client_id: client_id.clone(),
        client_secret: client_secret.clone(),
        authorize_url: parse_url("oauth-authorize-url", authorize_url)?,
        token_url: parse_url("oauth-token-url", token_url)?,
        userinfo_url: parse_url("oauth-userinfo-url", userinfo_url)?,
        redirect_url,
        scopes,
    }))
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    public_url: &Url,
    jwt_secret: String,
    access_token_ttl: u64,
    refresh_token_ttl: u64,
    oauth: Option<OAuth2Settings>,
) -> ServerConfig {
    let identity_provider = oauth.map(|settings| {
        info!(provider = %settings.provider_name, "OAuth2 login enabled");
        Arc::new(HttpIdentityProvider::new(settings)) as Arc<dyn IdentityProvider>
    });

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl,
        refresh_token_ttl,
        secure_cookies: public_url.scheme() == "https",
        identity_provider,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
