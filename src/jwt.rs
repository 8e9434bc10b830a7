//! JWT token generation and validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token - stateless, never stored
    Access,
    /// Long-lived refresh token - the current one is stored per user
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens.
///
/// The `jti` makes every refresh token unique, even two issued for the same
/// user within the same second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID. Defaulted so an access token decodes far enough to be
    /// reported as the wrong type.
    #[serde(default)]
    pub jti: String,
    /// Subject (user id)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl AccessClaims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        parse_subject(&self.sub)
    }
}

impl RefreshClaims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        parse_subject(&self.sub)
    }
}

fn parse_subject(sub: &str) -> Result<i64, TokenError> {
    sub.parse().map_err(|_| TokenError::Invalid)
}

/// Default access token duration: 30 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 30 * 60;

/// Default refresh token duration: 2 weeks
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 14 * 24 * 60 * 60;

/// Upper bound accepted for either token lifetime (one year).
pub const MAX_TOKEN_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Signing keys and token lifetimes.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_duration: u64,
    refresh_duration: u64,
}

/// A freshly signed token and its validity window.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    /// Create a new JWT configuration with the default token lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_durations(
            secret,
            ACCESS_TOKEN_DURATION_SECS,
            REFRESH_TOKEN_DURATION_SECS,
        )
    }

    /// Create a JWT configuration with explicit lifetimes (in seconds).
    pub fn with_durations(secret: &[u8], access_secs: u64, refresh_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_duration: access_secs,
            refresh_duration: refresh_secs,
        }
    }

    pub fn access_duration(&self) -> u64 {
        self.access_duration
    }

    pub fn refresh_duration(&self) -> u64 {
        self.refresh_duration
    }

    /// Generate an access token for a user, issued now.
    pub fn generate_access_token(&self, user_id: i64) -> Result<IssuedToken, TokenError> {
        self.generate_access_token_at(user_id, now()?)
    }

    /// Generate an access token issued at an explicit instant.
    pub fn generate_access_token_at(
        &self,
        user_id: i64,
        issued_at: u64,
    ) -> Result<IssuedToken, TokenError> {
        let exp = issued_at
            .checked_add(self.access_duration)
            .ok_or(TokenError::TimeError)?;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            token_type: TokenType::Access,
            iat: issued_at,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at: exp,
            duration: self.access_duration,
        })
    }

    /// Generate a refresh token for a user, issued now.
    pub fn generate_refresh_token(&self, user_id: i64) -> Result<IssuedToken, TokenError> {
        self.generate_refresh_token_at(user_id, now()?)
    }

    /// Generate a refresh token issued at an explicit instant.
    pub fn generate_refresh_token_at(
        &self,
        user_id: i64,
        issued_at: u64,
    ) -> Result<IssuedToken, TokenError> {
        let exp = issued_at
            .checked_add(self.refresh_duration)
            .ok_or(TokenError::TimeError)?;

        let claims = RefreshClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: issued_at,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at: exp,
            duration: self.refresh_duration,
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.decode(token, true)?;
        if claims.token_type != TokenType::Access {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.decode(token, true)?;
        if claims.token_type != TokenType::Refresh {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    /// Decode an access token checking only its signature and type.
    pub fn decode_access_token_ignoring_expiry(
        &self,
        token: &str,
    ) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.decode(token, false)?;
        if claims.token_type != TokenType::Access {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    /// Decode a refresh token checking only its signature and type.
    pub fn decode_refresh_token_ignoring_expiry(
        &self,
        token: &str,
    ) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.decode(token, false)?;
        if claims.token_type != TokenType::Refresh {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str, check_expiry: bool) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;

        jsonwebtoken::decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

/// Current Unix time in seconds.
pub fn now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signature and shape are fine but `exp` has passed
    #[error("Token has expired")]
    Expired,
    /// Malformed token or bad signature
    #[error("Invalid token")]
    Invalid,
    /// Wrong token type (e.g., using refresh token as access token)
    #[error("Wrong token type")]
    WrongType,
    /// Correctly signed refresh token that is no longer the stored one
    #[error("Refresh token is no longer valid")]
    Revoked,
    /// Error encoding the token
    #[error("Failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    /// System time error
    #[error("System time error")]
    TimeError,
}

impl TokenError {
    /// Whether this error is the caller's fault (401) rather than a server fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::Invalid | Self::WrongType | Self::Revoked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let result = config.generate_access_token(42).unwrap();
        assert_eq!(result.duration, ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(result.expires_at, result.issued_at + ACCESS_TOKEN_DURATION_SECS);

        let claims = config.validate_access_token(&result.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.iat, result.issued_at);
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let result = config.generate_refresh_token(7).unwrap();
        assert_eq!(result.duration, REFRESH_TOKEN_DURATION_SECS);

        let claims = config.validate_refresh_token(&result.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_custom_durations() {
        let config = JwtConfig::with_durations(b"secret", 60, 120);

        let access = config.generate_access_token_at(1, 1_000).unwrap();
        assert_eq!(access.expires_at, 1_060);

        let refresh = config.generate_refresh_token_at(1, 1_000).unwrap();
        assert_eq!(refresh.expires_at, 1_120);
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let access = config.generate_access_token(1).unwrap();
        let refresh = config.generate_refresh_token(1).unwrap();

        assert!(matches!(
            config.validate_refresh_token(&access.token),
            Err(TokenError::WrongType)
        ));
        assert!(matches!(
            config.validate_access_token(&refresh.token),
            Err(TokenError::WrongType)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let result = config.validate_access_token("invalid-token");
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1");
        let config2 = JwtConfig::new(b"secret-2");

        let result = config1.generate_access_token(1).unwrap();

        let validation = config2.validate_access_token(&result.token);
        assert!(matches!(validation, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig::with_durations(b"test-secret", 60, 120);
        let issued_at = now().unwrap() - 3600;

        let access = config.generate_access_token_at(1, issued_at).unwrap();
        let result = config.validate_access_token(&access.token);
        assert!(matches!(result, Err(TokenError::Expired)));

        let refresh = config.generate_refresh_token_at(1, issued_at).unwrap();
        let result = config.validate_refresh_token(&refresh.token);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_expired_token_with_wrong_secret_is_still_rejected() {
        let issuer = JwtConfig::with_durations(b"other-secret", 60, 120);
        let verifier = JwtConfig::new(b"test-secret");

        let access = issuer
            .generate_access_token_at(1, now().unwrap() - 3600)
            .unwrap();
        let result = verifier.validate_access_token(&access.token);
        assert!(result.unwrap_err().is_rejection());
    }

    #[test]
    fn test_decode_ignoring_expiry() {
        let config = JwtConfig::with_durations(b"test-secret", 60, 120);
        let issued_at = now().unwrap() - 3600;

        let access = config.generate_access_token_at(9, issued_at).unwrap();
        let claims = config
            .decode_access_token_ignoring_expiry(&access.token)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), 9);

        // Signature is still checked
        let other = JwtConfig::new(b"other-secret");
        assert!(other.decode_access_token_ignoring_expiry(&access.token).is_err());
    }

    #[test]
    fn test_unique_jti_per_refresh_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let result1 = config.generate_refresh_token_at(1, 1_000).unwrap();
        let result2 = config.generate_refresh_token_at(1, 1_000).unwrap();

        assert_ne!(
            result1.token, result2.token,
            "Each refresh token should be unique"
        );
    }

    #[test]
    fn test_expiry_overflow_is_an_error() {
        let config = JwtConfig::with_durations(b"test-secret-key-for-testing", u64::MAX, u64::MAX);

        assert!(matches!(
            config.generate_access_token_at(1, 1_000),
            Err(TokenError::TimeError)
        ));
        assert!(matches!(
            config.generate_refresh_token_at(1, 1_000),
            Err(TokenError::TimeError)
        ));
    }

    #[test]
    fn test_rejection_classification() {
        assert!(TokenError::Expired.is_rejection());
        assert!(TokenError::Revoked.is_rejection());
        assert!(!TokenError::TimeError.is_rejection());
    }
}
