//! Applications of users to team announcements.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(format!("Unknown application state: {}", other)),
        }
    }
}

fn parse_state(s: &str) -> Result<ApplicationState, sqlx::Error> {
    s.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))
}

/// A stored application.
#[derive(Debug, Clone)]
pub struct TeamApplication {
    pub id: i64,
    pub announcement_id: i64,
    pub user_id: i64,
    pub resume_id: Option<i64>,
    pub state: ApplicationState,
    pub created_at: NaiveDateTime,
}

/// An application as listed for the applicant.
#[derive(Debug, Clone)]
pub struct MyApplication {
    pub id: i64,
    pub announcement_id: i64,
    pub announcement_title: String,
    pub team_id: i64,
    pub team_name: String,
    pub resume_id: Option<i64>,
    pub state: ApplicationState,
    pub created_at: NaiveDateTime,
}

/// An application as listed for the team leader.
#[derive(Debug, Clone)]
pub struct ApplicationSummary {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub resume_id: Option<i64>,
    pub resume_title: Option<String>,
    pub state: ApplicationState,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: i64,
    announcement_id: i64,
    user_id: i64,
    resume_id: Option<i64>,
    state: String,
    created_at: NaiveDateTime,
}

impl TryFrom<ApplicationRow> for TeamApplication {
    type Error = sqlx::Error;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            announcement_id: row.announcement_id,
            user_id: row.user_id,
            resume_id: row.resume_id,
            state: parse_state(&row.state)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MyApplicationRow {
    id: i64,
    announcement_id: i64,
    announcement_title: String,
    team_id: i64,
    team_name: String,
    resume_id: Option<i64>,
    state: String,
    created_at: NaiveDateTime,
}

impl TryFrom<MyApplicationRow> for MyApplication {
    type Error = sqlx::Error;

    fn try_from(row: MyApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            announcement_id: row.announcement_id,
            announcement_title: row.announcement_title,
            team_id: row.team_id,
            team_name: row.team_name,
            resume_id: row.resume_id,
            state: parse_state(&row.state)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationSummaryRow {
    id: i64,
    user_id: i64,
    user_name: String,
    resume_id: Option<i64>,
    resume_title: Option<String>,
    state: String,
    created_at: NaiveDateTime,
}

impl TryFrom<ApplicationSummaryRow> for ApplicationSummary {
    type Error = sqlx::Error;

    fn try_from(row: ApplicationSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            resume_id: row.resume_id,
            resume_title: row.resume_title,
            state: parse_state(&row.state)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct ApplicationStore {
    pool: SqlitePool,
}

impl ApplicationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a pending application.
    /// Returns None if the user already applied to this announcement.
    pub async fn create(
        &self,
        announcement_id: i64,
        user_id: i64,
        resume_id: Option<i64>,
    ) -> Result<Option<TeamApplication>, sqlx::Error> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            "INSERT INTO applications (announcement_id, user_id, resume_id, state, created_at)
             VALUES (?, ?, ?, 'PENDING', ?)
             ON CONFLICT(announcement_id, user_id) DO NOTHING
             RETURNING id, announcement_id, user_id, resume_id, state, created_at",
        )
        .bind(announcement_id)
        .bind(user_id)
        .bind(resume_id)
        .bind(chrono::Utc::now().naive_utc())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TeamApplication::try_from).transpose()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<TeamApplication>, sqlx::Error> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            "SELECT id, announcement_id, user_id, resume_id, state, created_at
             FROM applications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TeamApplication::try_from).transpose()
    }

    /// One page of a user's applications, newest first, optionally filtered by state.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        state: Option<ApplicationState>,
        page: u32,
        size: u32,
    ) -> Result<Page<MyApplication>, sqlx::Error> {
        let state = state.map(|s| s.as_str());

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM applications WHERE user_id = ? AND (? IS NULL OR state = ?)",
        )
        .bind(user_id)
        .bind(state)
        .bind(state)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<MyApplicationRow> = sqlx::query_as(
            "SELECT ap.id, ap.announcement_id, an.title AS announcement_title,
                    t.id AS team_id, t.name AS team_name,
                    ap.resume_id, ap.state, ap.created_at
             FROM applications ap
             JOIN announcements an ON an.id = ap.announcement_id
             JOIN teams t ON t.id = an.team_id
             WHERE ap.user_id = ? AND (? IS NULL OR ap.state = ?)
             ORDER BY ap.created_at DESC, ap.id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(state)
        .bind(state)
        .bind(i64::from(size))
        .bind(i64::from(page) * i64::from(size))
        .fetch_all(&self.pool)
        .await?;

        let content = rows
            .into_iter()
            .map(MyApplication::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(content, page, size, total))
    }

    /// All applications to an announcement, oldest first.
    pub async fn list_by_announcement(
        &self,
        announcement_id: i64,
    ) -> Result<Vec<ApplicationSummary>, sqlx::Error> {
        let rows: Vec<ApplicationSummaryRow> = sqlx::query_as(
            "SELECT ap.id, ap.user_id, u.name AS user_name,
                    ap.resume_id, r.title AS resume_title, ap.state, ap.created_at
             FROM applications ap
             JOIN users u ON u.id = ap.user_id
             LEFT JOIN resumes r ON r.id = ap.resume_id
             WHERE ap.announcement_id = ?
             ORDER BY ap.id",
        )
        .bind(announcement_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ApplicationSummary::try_from).collect()
    }

    /// Set the state of an application. Returns false if it does not exist.
    pub async fn set_state(&self, id: i64, state: ApplicationState) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE applications SET state = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an application only while it is still pending.
    pub async fn delete_pending(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM applications WHERE id = ? AND state = 'PENDING'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewAnnouncement};
    use chrono::{Duration, Utc};

    struct Fixture {
        db: Database,
        applicant: i64,
        announcement_id: i64,
    }

    async fn setup() -> Fixture {
        let db = Database::open(":memory:").await.unwrap();
        let leader = db.users().upsert_oauth("github", "1", None, "lead").await.unwrap();
        let applicant = db.users().upsert_oauth("github", "2", None, "dev").await.unwrap();
        let team_id = db.teams().create("crabs", leader.id).await.unwrap();
        let announcement = db
            .announcements()
            .create(
                team_id,
                &NewAnnouncement {
                    title: "Backend".to_string(),
                    description: String::new(),
                    vacancies: 1,
                    occupations: vec![],
                    publish: true,
                    expired_at: Utc::now().naive_utc() + Duration::days(1),
                },
            )
            .await
            .unwrap();
        Fixture {
            db,
            applicant: applicant.id,
            announcement_id: announcement.id,
        }
    }

    #[tokio::test]
    async fn test_create_is_unique_per_announcement() {
        let f = setup().await;

        let created = f
            .db
            .applications()
            .create(f.announcement_id, f.applicant, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.state, ApplicationState::Pending);
        assert!(created.resume_id.is_none());

        let duplicate = f
            .db
            .applications()
            .create(f.announcement_id, f.applicant, None)
            .await
            .unwrap();
        assert!(duplicate.is_none());
    }

    #[tokio::test]
    async fn test_list_by_user_joins_titles_and_filters_state() {
        let f = setup().await;
        let resume = f.db.resumes().create(f.applicant, "cv", "").await.unwrap();
        let app = f
            .db
            .applications()
            .create(f.announcement_id, f.applicant, Some(resume.id))
            .await
            .unwrap()
            .unwrap();

        let page = f
            .db
            .applications()
            .list_by_user(f.applicant, None, 0, 10)
            .await
            .unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].announcement_title, "Backend");
        assert_eq!(page.content[0].team_name, "crabs");
        assert_eq!(page.content[0].resume_id, Some(resume.id));

        let accepted = f
            .db
            .applications()
            .list_by_user(f.applicant, Some(ApplicationState::Accepted), 0, 10)
            .await
            .unwrap();
        assert_eq!(accepted.total_elements, 0);

        assert!(
            f.db.applications()
                .set_state(app.id, ApplicationState::Accepted)
                .await
                .unwrap()
        );
        let accepted = f
            .db
            .applications()
            .list_by_user(f.applicant, Some(ApplicationState::Accepted), 0, 10)
            .await
            .unwrap();
        assert_eq!(accepted.total_elements, 1);
    }

    #[tokio::test]
    async fn test_list_by_announcement() {
        let f = setup().await;
        f.db.applications()
            .create(f.announcement_id, f.applicant, None)
            .await
            .unwrap();

        let list = f
            .db
            .applications()
            .list_by_announcement(f.announcement_id)
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user_name, "dev");
        assert!(list[0].resume_title.is_none());
    }

    #[tokio::test]
    async fn test_delete_only_while_pending() {
        let f = setup().await;
        let app = f
            .db
            .applications()
            .create(f.announcement_id, f.applicant, None)
            .await
            .unwrap()
            .unwrap();

        f.db.applications()
            .set_state(app.id, ApplicationState::Rejected)
            .await
            .unwrap();
        assert!(!f.db.applications().delete_pending(app.id).await.unwrap());

        f.db.applications()
            .set_state(app.id, ApplicationState::Pending)
            .await
            .unwrap();
        assert!(f.db.applications().delete_pending(app.id).await.unwrap());
        assert!(f.db.applications().get_by_id(app.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_resume_detaches_it() {
        let f = setup().await;
        let resume = f.db.resumes().create(f.applicant, "cv", "").await.unwrap();
        let app = f
            .db
            .applications()
            .create(f.announcement_id, f.applicant, Some(resume.id))
            .await
            .unwrap()
            .unwrap();

        sqlx::query("DELETE FROM resumes WHERE id = ?")
            .bind(resume.id)
            .execute(f.db.pool())
            .await
            .unwrap();

        let app = f.db.applications().get_by_id(app.id).await.unwrap().unwrap();
        assert!(app.resume_id.is_none());
    }
}
