use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ResumeStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Resume {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

impl ResumeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        title: &str,
        content: &str,
    ) -> Result<Resume, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO resumes (user_id, title, content) VALUES (?, ?, ?)
             RETURNING id, user_id, title, content, created_at",
        )
        .bind(user_id)
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Resume>, sqlx::Error> {
        sqlx::query_as("SELECT id, user_id, title, content, created_at FROM resumes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// All resumes of a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Resume>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, title, content, created_at FROM resumes
             WHERE user_id = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_create_and_list() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.users().upsert_oauth("github", "1", None, "alice").await.unwrap();
        let bob = db.users().upsert_oauth("github", "2", None, "bob").await.unwrap();

        let first = db.resumes().create(alice.id, "cv", "rust").await.unwrap();
        let second = db.resumes().create(alice.id, "cv 2", "more rust").await.unwrap();
        db.resumes().create(bob.id, "bob cv", "").await.unwrap();

        assert_eq!(first.user_id, alice.id);
        assert!(!first.created_at.is_empty());

        let mine = db.resumes().list_by_user(alice.id).await.unwrap();
        let ids: Vec<_> = mine.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let fetched = db.resumes().get_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "rust");
        assert!(db.resumes().get_by_id(9999).await.unwrap().is_none());
    }
}
