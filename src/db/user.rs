use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub provider: String,
    pub provider_id: String,
    pub email: Option<String>,
    pub name: String,
    pub bio: Option<String>,
    pub created_at: String,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user for an OAuth2 account, or refresh the email of the existing one.
    /// The display name is only taken from the provider on first login.
    pub async fn upsert_oauth(
        &self,
        provider: &str,
        provider_id: &str,
        email: Option<&str>,
        name: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (provider, provider_id, email, name) VALUES (?, ?, ?, ?)
             ON CONFLICT(provider, provider_id) DO UPDATE SET email = COALESCE(excluded.email, users.email)",
        )
        .bind(provider)
        .bind(provider_id)
        .bind(email)
        .bind(name)
        .execute(&self.pool)
        .await?;

        sqlx::query_as(
            "SELECT id, provider, provider_id, email, name, bio, created_at FROM users WHERE provider = ? AND provider_id = ?",
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, provider, provider_id, email, name, bio, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Update the editable profile fields. Returns false if the user does not exist.
    pub async fn update_info(
        &self,
        id: i64,
        name: &str,
        bio: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET name = ?, bio = ? WHERE id = ?")
            .bind(name)
            .bind(bio)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
