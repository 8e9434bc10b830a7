use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TeamStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub leader_id: i64,
    pub created_at: String,
}

impl TeamStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a team led by `leader_id`. Returns the new team ID.
    pub async fn create(&self, name: &str, leader_id: i64) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO teams (name, leader_id) VALUES (?, ?)")
            .bind(name)
            .bind(leader_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Team>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, leader_id, created_at FROM teams WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
