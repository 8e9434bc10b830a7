//! Team recruitment announcements and their occupation tags.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::Page;

/// Roles an announcement recruits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Occupation {
    DevelopmentBackend,
    DevelopmentFrontend,
    DevelopmentMobile,
    DevelopmentGame,
    DevelopmentDevops,
    DevelopmentSecurity,
    DevelopmentDba,
    DevelopmentAi,
    Design,
    Planning,
    Marketing,
}

impl Occupation {
    pub const ALL: [Occupation; 11] = [
        Self::DevelopmentBackend,
        Self::DevelopmentFrontend,
        Self::DevelopmentMobile,
        Self::DevelopmentGame,
        Self::DevelopmentDevops,
        Self::DevelopmentSecurity,
        Self::DevelopmentDba,
        Self::DevelopmentAi,
        Self::Design,
        Self::Planning,
        Self::Marketing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DevelopmentBackend => "DEVELOPMENT_BACKEND",
            Self::DevelopmentFrontend => "DEVELOPMENT_FRONTEND",
            Self::DevelopmentMobile => "DEVELOPMENT_MOBILE",
            Self::DevelopmentGame => "DEVELOPMENT_GAME",
            Self::DevelopmentDevops => "DEVELOPMENT_DEVOPS",
            Self::DevelopmentSecurity => "DEVELOPMENT_SECURITY",
            Self::DevelopmentDba => "DEVELOPMENT_DBA",
            Self::DevelopmentAi => "DEVELOPMENT_AI",
            Self::Design => "DESIGN",
            Self::Planning => "PLANNING",
            Self::Marketing => "MARKETING",
        }
    }
}

impl fmt::Display for Occupation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Occupation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|o| o.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown occupation: {}", s))
    }
}

/// An announcement with its occupation tags.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub id: i64,
    pub team_id: i64,
    pub title: String,
    pub description: String,
    pub vacancies: i64,
    pub occupations: Vec<Occupation>,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub expired_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Announcement {
    /// Whether the announcement currently accepts applications.
    pub fn is_open(&self, now: NaiveDateTime) -> bool {
        self.published && self.expired_at > now && self.vacancies > 0
    }
}

/// Editable fields of an announcement, used for both create and update.
#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub title: String,
    pub description: String,
    pub vacancies: i64,
    pub occupations: Vec<Occupation>,
    pub publish: bool,
    pub expired_at: NaiveDateTime,
}

/// Listing filter. Empty `occupations` matches every announcement.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    pub team_id: Option<i64>,
    pub published: Option<bool>,
    pub occupations: Vec<Occupation>,
}

#[derive(sqlx::FromRow)]
struct AnnouncementRow {
    id: i64,
    team_id: i64,
    title: String,
    description: String,
    vacancies: i64,
    published: bool,
    published_at: Option<NaiveDateTime>,
    expired_at: NaiveDateTime,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl AnnouncementRow {
    fn into_announcement(self, occupations: Vec<Occupation>) -> Announcement {
        Announcement {
            id: self.id,
            team_id: self.team_id,
            title: self.title,
            description: self.description,
            vacancies: self.vacancies,
            occupations,
            published: self.published,
            published_at: self.published_at,
            expired_at: self.expired_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const FILTER_CLAUSE: &str = "(? IS NULL OR a.team_id = ?)
    AND (? IS NULL OR a.published = ?)
    AND (? = 0 OR EXISTS (
        SELECT 1 FROM announcement_occupations o
        WHERE o.announcement_id = a.id
          AND o.occupation IN (SELECT value FROM json_each(?))
    ))";

#[derive(Clone)]
pub struct AnnouncementStore {
    pool: SqlitePool,
}

impl AnnouncementStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an announcement for a team. Publishing stamps `published_at`.
    pub async fn create(
        &self,
        team_id: i64,
        new: &NewAnnouncement,
    ) -> Result<Announcement, sqlx::Error> {
        let now = chrono::Utc::now().naive_utc();
        let published_at = new.publish.then_some(now);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO announcements (team_id, title, description, vacancies, published, published_at, expired_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(team_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.vacancies)
        .bind(new.publish)
        .bind(published_at)
        .bind(new.expired_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        Self::insert_occupations(&mut tx, id, &new.occupations).await?;
        tx.commit().await?;

        Ok(Announcement {
            id,
            team_id,
            title: new.title.clone(),
            description: new.description.clone(),
            vacancies: new.vacancies,
            occupations: dedup(&new.occupations),
            published: new.publish,
            published_at,
            expired_at: new.expired_at,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Announcement>, sqlx::Error> {
        let row: Option<AnnouncementRow> = sqlx::query_as(
            "SELECT id, team_id, title, description, vacancies, published, published_at, expired_at, created_at, updated_at
             FROM announcements WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut occupations = self.load_occupations(&[row.id]).await?;
        let tags = occupations.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_announcement(tags)))
    }

    /// Replace the editable fields and the occupation tags.
    /// `published_at` is kept while published, set on first publish and cleared on unpublish.
    /// Returns false if the announcement does not exist.
    pub async fn update(&self, id: i64, update: &NewAnnouncement) -> Result<bool, sqlx::Error> {
        let now = chrono::Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE announcements SET
                title = ?,
                description = ?,
                vacancies = ?,
                published = ?,
                published_at = CASE WHEN ? THEN COALESCE(published_at, ?) ELSE NULL END,
                expired_at = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.vacancies)
        .bind(update.publish)
        .bind(update.publish)
        .bind(now)
        .bind(update.expired_at)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM announcement_occupations WHERE announcement_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::insert_occupations(&mut tx, id, &update.occupations).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Delete an announcement. Its tags and applications cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One page of announcements matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &AnnouncementFilter,
        page: u32,
        size: u32,
    ) -> Result<Page<Announcement>, sqlx::Error> {
        let occupations_json = serde_json::to_string(&filter.occupations)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let has_occupations = !filter.occupations.is_empty();

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM announcements a WHERE {}",
            FILTER_CLAUSE
        ))
        .bind(filter.team_id)
        .bind(filter.team_id)
        .bind(filter.published)
        .bind(filter.published)
        .bind(has_occupations)
        .bind(&occupations_json)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<AnnouncementRow> = sqlx::query_as(&format!(
            "SELECT a.id, a.team_id, a.title, a.description, a.vacancies, a.published, a.published_at, a.expired_at, a.created_at, a.updated_at
             FROM announcements a WHERE {}
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT ? OFFSET ?",
            FILTER_CLAUSE
        ))
        .bind(filter.team_id)
        .bind(filter.team_id)
        .bind(filter.published)
        .bind(filter.published)
        .bind(has_occupations)
        .bind(&occupations_json)
        .bind(i64::from(size))
        .bind(i64::from(page) * i64::from(size))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut occupations = self.load_occupations(&ids).await?;

        let content = rows
            .into_iter()
            .map(|row| {
                let tags = occupations.remove(&row.id).unwrap_or_default();
                row.into_announcement(tags)
            })
            .collect();

        Ok(Page::new(content, page, size, total))
    }

    async fn load_occupations(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Occupation>>, sqlx::Error> {
        let mut map: HashMap<i64, Vec<Occupation>> = HashMap::new();
        if ids.is_empty() {
            return Ok(map);
        }

        let ids_json =
            serde_json::to_string(ids).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT announcement_id, occupation FROM announcement_occupations
             WHERE announcement_id IN (SELECT value FROM json_each(?))
             ORDER BY rowid",
        )
        .bind(ids_json)
        .fetch_all(&self.pool)
        .await?;

        for (announcement_id, occupation) in rows {
            let occupation = occupation
                .parse::<Occupation>()
                .map_err(|e| sqlx::Error::Decode(e.into()))?;
            map.entry(announcement_id).or_default().push(occupation);
        }
        Ok(map)
    }

    async fn insert_occupations(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        announcement_id: i64,
        occupations: &[Occupation],
    ) -> Result<(), sqlx::Error> {
        for occupation in dedup(occupations) {
            sqlx::query(
                "INSERT INTO announcement_occupations (announcement_id, occupation) VALUES (?, ?)",
            )
            .bind(announcement_id)
            .bind(occupation.as_str())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

fn dedup(occupations: &[Occupation]) -> Vec<Occupation> {
    let mut seen = Vec::with_capacity(occupations.len());
    for o in occupations {
        if !seen.contains(o) {
            seen.push(*o);
        }
    }
    seen
}
