//! Cookie parsing and `Set-Cookie` builders.

use axum::http::header;

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// The refresh cookie is only sent to the auth endpoints.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Cookie carrying the OAuth2 CSRF state between authorize and callback.
pub const OAUTH_STATE_COOKIE_NAME: &str = "oauth2_state";

pub const OAUTH_STATE_COOKIE_PATH: &str = "/api/auth/oauth2";

/// Lifetime of the OAuth2 state cookie: 10 minutes
pub const OAUTH_STATE_MAX_AGE_SECS: u64 = 10 * 60;

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

struct CookieSpec<'a> {
    name: &'a str,
    path: &'a str,
    same_site: &'a str,
}

const REFRESH: CookieSpec<'static> = CookieSpec {
    name: REFRESH_COOKIE_NAME,
    path: REFRESH_COOKIE_PATH,
    same_site: "Strict",
};

// Lax so the cookie survives the cross-site redirect back from the provider
const OAUTH_STATE: CookieSpec<'static> = CookieSpec {
    name: OAUTH_STATE_COOKIE_NAME,
    path: OAUTH_STATE_COOKIE_PATH,
    same_site: "Lax",
};

fn build_cookie(spec: &CookieSpec<'_>, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite={}; Path={}; Max-Age={}{}",
        spec.name, value, spec.same_site, spec.path, max_age, secure
    )
}

pub fn refresh_cookie(token: &str, max_age: u64, secure: bool) -> String {
    build_cookie(&REFRESH, token, max_age, secure)
}

pub fn clear_refresh_cookie(secure: bool) -> String {
    build_cookie(&REFRESH, "", 0, secure)
}

pub fn oauth_state_cookie(state: &str, secure: bool) -> String {
    build_cookie(&OAUTH_STATE, state, OAUTH_STATE_MAX_AGE_SECS, secure)
}

pub fn clear_oauth_state_cookie(secure: bool) -> String {
    build_cookie(&OAUTH_STATE, "", 0, secure)
}
