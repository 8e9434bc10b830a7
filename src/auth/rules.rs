//! Ordered path rules deciding which requests need a principal.
//!
//! Patterns are matched segment by segment. `*` matches exactly one non-empty
//! segment and a trailing `/**` matches the prefix itself plus any suffix.
//! The first matching rule wins; unmatched requests get the default level.

use axum::http::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Public,
    Authenticated,
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    method: Method,
    pattern: String,
    level: AccessLevel,
}

impl AccessRule {
    pub fn new(method: Method, pattern: impl Into<String>, level: AccessLevel) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            level,
        }
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && path_matches(&self.pattern, path)
    }
}

#[derive(Debug, Clone)]
pub struct SecurityRules {
    rules: Vec<AccessRule>,
    default_level: AccessLevel,
}

impl SecurityRules {
    /// Empty rule set where everything falls through to `default_level`.
    pub fn new(default_level: AccessLevel) -> Self {
        Self {
            rules: Vec::new(),
            default_level,
        }
    }

    /// Allow anonymous access for one method on a pattern.
    pub fn permit(mut self, method: Method, pattern: &str) -> Self {
        self.rules
            .push(AccessRule::new(method, pattern, AccessLevel::Public));
        self
    }

    pub fn evaluate(&self, method: &Method, path: &str) -> AccessLevel {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| rule.level)
            .unwrap_or(self.default_level)
    }
}

impl Default for SecurityRules {
    fn default() -> Self {
        Self::new(AccessLevel::Authenticated)
            .permit(Method::GET, "/")
            .permit(Method::POST, "/api/auth/reissue")
            .permit(Method::POST, "/api/auth/logout")
            .permit(Method::GET, "/api/auth/oauth2/**")
            .permit(Method::GET, "/api/announcement")
            .permit(Method::GET, "/api/team/*/announcement")
            .permit(Method::GET, "/api/team/*/announcement/*")
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let pattern_segments = segments(pattern);
    let path_segments = segments(path);

    let (fixed, any_suffix) = match pattern_segments.split_last() {
        Some((&"**", prefix)) => (prefix, true),
        _ => (pattern_segments.as_slice(), false),
    };

    if any_suffix {
        if path_segments.len() < fixed.len() {
            return false;
        }
    } else if path_segments.len() != fixed.len() {
        return false;
    }

    fixed
        .iter()
        .zip(path_segments.iter())
        .all(|(p, s)| *p == "*" || p == s)
}
