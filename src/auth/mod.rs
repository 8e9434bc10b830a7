//! Token lifecycle and request authentication.
//!
//! Access tokens (30 min, stateless) travel as `Authorization: Bearer`.
//! Refresh tokens (2 weeks) travel in an HttpOnly cookie scoped to
//! `/api/auth`, and only the latest one issued to a user is accepted.

mod cookie;
mod pipeline;
mod principal;
mod provider;
mod rules;
mod service;

pub use cookie::{
    OAUTH_STATE_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_oauth_state_cookie, clear_refresh_cookie,
    get_cookie, oauth_state_cookie, refresh_cookie,
};
pub use pipeline::{SecurityState, security_filter};
pub use principal::{AuthFailure, OptionalPrincipal, Principal, PrincipalDetails};
pub use provider::{TokenPair, TokenProvider, TokenResponse};
pub use rules::{AccessLevel, SecurityRules};
pub use service::AuthService;
