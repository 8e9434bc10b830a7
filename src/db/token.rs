//! Refresh token storage.
//!
//! Only refresh tokens are stored, one row per user. Saving a new token for a
//! user replaces the previous one, and rotation is a compare-and-swap on the
//! stored value so a concurrent logout or reissue cannot resurrect an old token.
//! Access tokens are stateless and never touch this table.

use sqlx::sqlite::SqlitePool;

/// The currently stored refresh token for a user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredRefreshToken {
    pub user_id: i64,
    pub token: String,
    pub expires_at: i64,
    pub updated_at: String,
}

/// Store for managing the live refresh token of each user.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store `token` as the user's current refresh token, replacing any prior one.
    pub async fn save(&self, user_id: i64, token: &str, expires_at: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                token = excluded.token,
                expires_at = excluded.expires_at,
                updated_at = datetime('now')",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether `token` is the user's current, unexpired refresh token.
    pub async fn is_valid(&self, user_id: i64, token: &str) -> Result<bool, sqlx::Error> {
        let now = unix_now();
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM refresh_tokens WHERE user_id = ? AND token = ? AND expires_at > ?",
        )
        .bind(user_id)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Replace `presented` with `replacement` only if `presented` is still current.
    /// Returns false if another reissue or a logout got there first.
    pub async fn rotate(
        &self,
        user_id: i64,
        presented: &str,
        replacement: &str,
        expires_at: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET token = ?, expires_at = ?, updated_at = datetime('now')
             WHERE user_id = ? AND token = ?",
        )
        .bind(replacement)
        .bind(expires_at)
        .bind(user_id)
        .bind(presented)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove the user's refresh token (logout).
    pub async fn invalidate(&self, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the stored refresh token for a user.
    pub async fn get(&self, user_id: i64) -> Result<Option<StoredRefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT user_id, token, expires_at, updated_at FROM refresh_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete all expired tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(unix_now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    const FAR_FUTURE: i64 = 4_102_444_800; // 2100-01-01

    async fn db_with_user() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .upsert_oauth("github", "42", None, "alice")
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_save_and_validate() {
        let (db, user_id) = db_with_user().await;

        db.tokens().save(user_id, "r1", FAR_FUTURE).await.unwrap();

        assert!(db.tokens().is_valid(user_id, "r1").await.unwrap());
        assert!(!db.tokens().is_valid(user_id, "r2").await.unwrap());
        assert!(!db.tokens().is_valid(user_id + 1, "r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_token() {
        let (db, user_id) = db_with_user().await;

        db.tokens().save(user_id, "r1", FAR_FUTURE).await.unwrap();
        db.tokens().save(user_id, "r2", FAR_FUTURE).await.unwrap();

        assert!(!db.tokens().is_valid(user_id, "r1").await.unwrap());
        assert!(db.tokens().is_valid(user_id, "r2").await.unwrap());
    }

    #[tokio::test]
    async fn test_rotate_requires_current_token() {
        let (db, user_id) = db_with_user().await;
        db.tokens().save(user_id, "r1", FAR_FUTURE).await.unwrap();

        assert!(db.tokens().rotate(user_id, "r1", "r2", FAR_FUTURE).await.unwrap());
        // r1 was rotated out, so a second rotation from it must lose
        assert!(!db.tokens().rotate(user_id, "r1", "r3", FAR_FUTURE).await.unwrap());

        let stored = db.tokens().get(user_id).await.unwrap().unwrap();
        assert_eq!(stored.token, "r2");
    }

    #[tokio::test]
    async fn test_rotate_after_invalidate_fails() {
        let (db, user_id) = db_with_user().await;
        db.tokens().save(user_id, "r1", FAR_FUTURE).await.unwrap();

        assert!(db.tokens().invalidate(user_id).await.unwrap());
        assert!(!db.tokens().rotate(user_id, "r1", "r2", FAR_FUTURE).await.unwrap());
        assert!(db.tokens().get(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (db, user_id) = db_with_user().await;

        assert!(!db.tokens().invalidate(user_id).await.unwrap());
        db.tokens().save(user_id, "r1", FAR_FUTURE).await.unwrap();
        assert!(db.tokens().invalidate(user_id).await.unwrap());
        assert!(!db.tokens().is_valid(user_id, "r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_token_not_valid_and_cleaned_up() {
        let (db, user_id) = db_with_user().await;
        db.tokens().save(user_id, "old", 1_000).await.unwrap();

        assert!(!db.tokens().is_valid(user_id, "old").await.unwrap());
        assert_eq!(db.tokens().delete_expired().await.unwrap(), 1);
        assert!(db.tokens().get(user_id).await.unwrap().is_none());
    }
}
