//! OAuth2 authorization-code login against an external identity provider.

use async_trait::async_trait;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Profile {
    pub provider: String,
    pub provider_id: String,
    pub email: Option<String>,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Token endpoint returned {0}")]
    TokenExchange(reqwest::StatusCode),
    #[error("Userinfo endpoint returned {0}")]
    UserInfo(reqwest::StatusCode),
    #[error("Provider response is missing `{0}`")]
    MissingField(&'static str),
    #[error("Request to identity provider failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stable provider name stored with the user, e.g. "github".
    fn name(&self) -> &str;

    /// Where to send the browser to start the login.
    fn authorize_url(&self, state: &str) -> String;

    /// Trade an authorization code for the user's profile.
    async fn exchange_code(&self, code: &str) -> Result<OAuth2Profile, OAuthError>;
}

/// Endpoints and credentials of an OAuth2 provider.
#[derive(Debug, Clone)]
pub struct OAuth2Settings {
    pub provider_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub redirect_url: Url,
    pub scopes: Vec<String>,
}

/// Generic provider speaking the authorization-code grant over HTTP.
pub struct HttpIdentityProvider {
    settings: OAuth2Settings,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
}

impl HttpIdentityProvider {
    pub fn new(settings: OAuth2Settings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn name(&self) -> &str {
        &self.settings.provider_name
    }

    fn authorize_url(&self, state: &str) -> String {
        let mut url = self.settings.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", self.settings.redirect_url.as_str())
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("state", state);
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuth2Profile, OAuthError> {
        let response = self
            .client
            .post(self.settings.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.redirect_url.as_str()),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OAuthError::TokenExchange(response.status()));
        }
        let token: TokenEndpointResponse = response.json().await?;

        let response = self
            .client
            .get(self.settings.userinfo_url.clone())
            .bearer_auth(&token.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, "teamhire")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OAuthError::UserInfo(response.status()));
        }
        let userinfo: Value = response.json().await?;

        profile_from_userinfo(&self.settings.provider_name, &userinfo)
    }
}

/// Build a profile from a userinfo document.
///
/// The subject is `sub` (OpenID Connect) or `id` (GitHub style, string or number).
/// The display name falls back to the local part of the email, then to "user".
pub fn profile_from_userinfo(provider: &str, userinfo: &Value) -> Result<OAuth2Profile, OAuthError> {
    let provider_id = match userinfo.get("sub").or_else(|| userinfo.get("id")) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(OAuthError::MissingField("sub")),
    };

    let email = userinfo
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    let name = userinfo
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| {
            email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "user".to_string());

    Ok(OAuth2Profile {
        provider: provider.to_string(),
        provider_id,
        email,
        name,
    })
}

/// Random CSRF state for one authorization round trip.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Form, Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    fn settings() -> OAuth2Settings {
        OAuth2Settings {
            provider_name: "github".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "shh".to_string(),
            authorize_url: Url::parse("https://github.com/login/oauth/authorize").unwrap(),
            token_url: Url::parse("https://github.com/login/oauth/access_token").unwrap(),
            userinfo_url: Url::parse("https://api.github.com/user").unwrap(),
            redirect_url: Url::parse("http://localhost:8080/api/auth/oauth2/callback").unwrap(),
            scopes: vec!["read:user".to_string(), "user:email".to_string()],
        }
    }

    #[test]
    fn test_authorize_url() {
        let provider = HttpIdentityProvider::new(settings());
        let url = Url::parse(&provider.authorize_url("xyz")).unwrap();

        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-1");
        assert_eq!(
            pairs["redirect_uri"],
            "http://localhost:8080/api/auth/oauth2/callback"
        );
        assert_eq!(pairs["scope"], "read:user user:email");
        assert_eq!(pairs["state"], "xyz");
        assert_eq!(provider.name(), "github");
    }

    type SeenForm = Arc<Mutex<Option<HashMap<String, String>>>>;

    /// Token and userinfo endpoints on a local port. Code "good" yields a usable
    /// access token, "stale" one the userinfo endpoint rejects, anything else a 400.
    async fn stub_provider() -> (OAuth2Settings, SeenForm) {
        let seen: SeenForm = Arc::default();

        async fn token(
            State(seen): State<SeenForm>,
            Form(form): Form<HashMap<String, String>>,
        ) -> Response {
            let code = form.get("code").cloned().unwrap_or_default();
            *seen.lock().unwrap() = Some(form);
            match code.as_str() {
                "good" => Json(json!({"access_token": "at-good", "token_type": "bearer"})).into_response(),
                "stale" => Json(json!({"access_token": "at-stale"})).into_response(),
                _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response(),
            }
        }

        async fn userinfo(headers: HeaderMap) -> Response {
            match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                Some("Bearer at-good") => {
                    Json(json!({"id": 99, "email": "dev@example.com", "name": "Dev"})).into_response()
                }
                _ => StatusCode::UNAUTHORIZED.into_response(),
            }
        }

        let app = Router::new()
            .route("/token", post(token))
            .route("/userinfo", get(userinfo))
            .with_state(seen.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let settings = OAuth2Settings {
            token_url: base.join("/token").unwrap(),
            userinfo_url: base.join("/userinfo").unwrap(),
            ..settings()
        };
        (settings, seen)
    }

    #[tokio::test]
    async fn test_exchange_code_against_provider() {
        let (settings, seen) = stub_provider().await;
        let provider = HttpIdentityProvider::new(settings);

        let profile = provider.exchange_code("good").await.unwrap();
        assert_eq!(
            profile,
            OAuth2Profile {
                provider: "github".to_string(),
                provider_id: "99".to_string(),
                email: Some("dev@example.com".to_string()),
                name: "Dev".to_string(),
            }
        );

        let form = seen.lock().unwrap().take().unwrap();
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "good");
        assert_eq!(form["client_id"], "client-1");
        assert_eq!(form["client_secret"], "shh");
        assert_eq!(
            form["redirect_uri"],
            "http://localhost:8080/api/auth/oauth2/callback"
        );
    }

    #[tokio::test]
    async fn test_exchange_code_error_statuses() {
        let (settings, _) = stub_provider().await;
        let provider = HttpIdentityProvider::new(settings);

        let err = provider.exchange_code("expired").await.unwrap_err();
        assert!(matches!(err, OAuthError::TokenExchange(status) if status == StatusCode::BAD_REQUEST));

        let err = provider.exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, OAuthError::UserInfo(status) if status == StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_exchange_code_unreachable_provider() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let provider = HttpIdentityProvider::new(OAuth2Settings {
            token_url: base.join("/token").unwrap(),
            ..settings()
        });
        let err = provider.exchange_code("good").await.unwrap_err();
        assert!(matches!(err, OAuthError::Http(_)));
    }

    #[test]
    fn test_profile_from_oidc_userinfo() {
        let profile = profile_from_userinfo(
            "google",
            &json!({"sub": "abc", "email": "jane@example.com", "name": "Jane"}),
        )
        .unwrap();
        assert_eq!(profile.provider_id, "abc");
        assert_eq!(profile.name, "Jane");
        assert_eq!(profile.email.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn test_profile_name_fallbacks() {
        let profile =
            profile_from_userinfo("github", &json!({"id": 42, "email": "kim@example.com", "name": null}))
                .unwrap();
        assert_eq!(profile.provider_id, "42");
        assert_eq!(profile.name, "kim");

        let profile = profile_from_userinfo("github", &json!({"id": "7"})).unwrap();
        assert_eq!(profile.name, "user");
        assert!(profile.email.is_none());
    }

    #[test]
    fn test_profile_requires_subject() {
        let err = profile_from_userinfo("github", &json!({"email": "x@y.z"})).unwrap_err();
        assert!(matches!(err, OAuthError::MissingField("sub")));
    }

    #[test]
    fn test_generate_state() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
    }
}
