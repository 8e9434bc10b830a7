#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use teamhire::{
    ServerConfig,
    auth::{AuthService, TokenPair, TokenProvider},
    create_app,
    db::Database,
    jwt::JwtConfig,
    oauth::IdentityProvider,
};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";

/// A fully wired app plus direct handles on its storage and signing keys.
pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub auth: AuthService,
}

pub async fn setup() -> TestContext {
    setup_with_provider(None).await
}

pub async fn setup_with_provider(provider: Option<Arc<dyn IdentityProvider>>) -> TestContext {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let mut config = ServerConfig::new(db.clone(), JWT_SECRET);
    config.identity_provider = provider;

    let jwt = Arc::new(JwtConfig::new(JWT_SECRET));
    let auth = AuthService::new(db.clone(), TokenProvider::new(jwt.clone()));

    TestContext {
        app: create_app(&config),
        db,
        jwt,
        auth,
    }
}

/// Decoded response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: serde_json::Value,
}

impl TestResponse {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .collect()
    }

    /// Value of a cookie set by the response, if any.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.set_cookies().iter().find_map(|c| {
            c.strip_prefix(&prefix)
                .map(|rest| rest.split(';').next().unwrap_or("").to_string())
        })
    }

    pub fn message(&self) -> &str {
        self.json["message"].as_str().unwrap_or("")
    }
}

impl TestContext {
    pub async fn create_user(&self, name: &str) -> i64 {
        self.db
            .users()
            .upsert_oauth("github", name, Some(&format!("{}@example.com", name)), name)
            .await
            .unwrap()
            .id
    }

    /// Log a user in directly, storing its refresh token.
    pub async fn login(&self, user_id: i64) -> TokenPair {
        self.auth.login(user_id).await.unwrap()
    }

    /// Create a user and log them in. Returns (user_id, access_token).
    pub async fn user_with_token(&self, name: &str) -> (i64, String) {
        let id = self.create_user(name).await;
        let pair = self.login(id).await;
        (id, pair.access.token)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        TestResponse {
            status,
            headers,
            json,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request("GET", uri, token, None).await
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// POST with only the refresh cookie, the way a browser calls reissue/logout.
    pub async fn post_with_refresh_cookie(
        &self,
        uri: &str,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, format!("refresh_token={}", refresh_token));
        if let Some(token) = access_token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Create a team led by the owner of `token`. Returns the team id.
    pub async fn create_team(&self, token: &str, name: &str) -> i64 {
        let response = self
            .request(
                "POST",
                "/api/team",
                Some(token),
                Some(serde_json::json!({ "name": name })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json["id"].as_i64().unwrap()
    }

    /// Create an announcement. Returns the announcement id.
    pub async fn create_announcement(
        &self,
        token: &str,
        team_id: i64,
        body: serde_json::Value,
    ) -> i64 {
        let response = self
            .request(
                "POST",
                &format!("/api/team/{}/announcement", team_id),
                Some(token),
                Some(body),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json);
        response.json["id"].as_i64().unwrap()
    }
}

/// A valid announcement body, published, expiring in a week.
pub fn announcement_body(title: &str, occupations: &[&str]) -> serde_json::Value {
    let expired_at = (chrono::Utc::now() + chrono::Duration::days(7))
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    serde_json::json!({
        "title": title,
        "description": "We are hiring",
        "vacancies": 2,
        "occupations": occupations,
        "publish": true,
        "expiredAt": expired_at,
    })
}
