//! Login, reissue and logout over the token provider and the token store.

use tracing::{debug, info};

use super::provider::{TokenPair, TokenProvider};
use crate::db::{Database, User};
use crate::error::{AppError, ResultExt};
use crate::jwt::{IssuedToken, TokenError};
use crate::oauth::OAuth2Profile;

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    provider: TokenProvider,
}

fn expiry(token: &IssuedToken) -> Result<i64, AppError> {
    i64::try_from(token.expires_at).map_err(|_| AppError::internal("Token expiry out of range"))
}

impl AuthService {
    pub fn new(db: Database, provider: TokenProvider) -> Self {
        Self { db, provider }
    }

    pub fn provider(&self) -> &TokenProvider {
        &self.provider
    }

    /// Issue a pair for `user_id` and make its refresh token the only live one.
    pub async fn login(&self, user_id: i64) -> Result<TokenPair, AppError> {
        let pair = self.provider.issue_token_pair(user_id)?;
        self.db
            .tokens()
            .save(user_id, &pair.refresh.token, expiry(&pair.refresh)?)
            .await
            .db_err("Failed to store refresh token")?;

        info!(user_id, "User logged in");
        Ok(pair)
    }

    /// Find or create the user behind an OAuth2 profile, then log them in.
    pub async fn login_oauth2(
        &self,
        profile: &OAuth2Profile,
    ) -> Result<(User, TokenPair), AppError> {
        let user = self
            .db
            .users()
            .upsert_oauth(
                &profile.provider,
                &profile.provider_id,
                profile.email.as_deref(),
                &profile.name,
            )
            .await
            .db_err("Failed to upsert OAuth2 user")?;

        let pair = self.login(user.id).await?;
        Ok((user, pair))
    }

    /// Exchange the current refresh token for a new pair.
    ///
    /// The presented token must be correctly signed, unexpired, of refresh
    /// type, and still the stored token of its user. The store only changes
    /// when all checks pass, and the swap itself is conditional, so a token
    /// that lost a race with another reissue or a logout is rejected.
    pub async fn reissue_token(&self, refresh: Option<&str>) -> Result<TokenPair, AppError> {
        let presented = refresh.ok_or(AppError::AuthenticationRequired)?;

        let claims = self.provider.validate_refresh_token(presented)?;
        let user_id = claims.user_id()?;

        let current = self
            .db
            .tokens()
            .is_valid(user_id, presented)
            .await
            .db_err("Failed to check refresh token")?;
        if !current {
            debug!(user_id, "Refresh token is not the stored one");
            return Err(TokenError::Revoked.into());
        }

        let pair = self.provider.issue_token_pair(user_id)?;

        let rotated = self
            .db
            .tokens()
            .rotate(user_id, presented, &pair.refresh.token, expiry(&pair.refresh)?)
            .await
            .db_err("Failed to rotate refresh token")?;
        if !rotated {
            debug!(user_id, "Refresh token was replaced concurrently");
            return Err(TokenError::Revoked.into());
        }

        info!(user_id, "Reissued token pair");
        Ok(pair)
    }

    /// Drop the stored refresh token of whoever the tokens identify.
    /// Returns the user that was logged out, if any could be identified.
    pub async fn logout(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<Option<i64>, AppError> {
        let Some(user_id) = self.provider.identify_ignoring_expiry(access, refresh) else {
            debug!("Logout without an identifiable user");
            return Ok(None);
        };

        self.db
            .tokens()
            .invalidate(user_id)
            .await
            .db_err("Failed to invalidate refresh token")?;

        info!(user_id, "User logged out");
        Ok(Some(user_id))
    }
}
