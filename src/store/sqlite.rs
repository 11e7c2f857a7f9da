//! SQLite-backed catalog implementation.

use super::{Catalog, NewPart, NewSeries, Part, PartStatus, Series};
use crate::error::{Result, TekstError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS series (
        series_id TEXT PRIMARY KEY,
        unique_id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        description TEXT,
        thumbnail_url TEXT,
        owner_name TEXT,
        owner_avatar_url TEXT,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS parts (
        part_id TEXT PRIMARY KEY,
        series_id TEXT NOT NULL REFERENCES series(series_id),
        page_number INTEGER NOT NULL,
        title TEXT NOT NULL,
        status INTEGER NOT NULL DEFAULT 0,
        subtitle TEXT,
        default_note TEXT,
        updated_at TEXT NOT NULL,
        UNIQUE(series_id, page_number)
    );

    CREATE INDEX IF NOT EXISTS idx_parts_series_id ON parts(series_id);
"#;

/// SQLite-backed catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) a catalog database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite catalog at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TekstError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn series_from_row(row: &Row<'_>) -> rusqlite::Result<Series> {
        Ok(Series {
            series_id: parse_uuid(row.get::<_, String>(0)?)?,
            unique_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            thumbnail_url: row.get(4)?,
            owner_name: row.get(5)?,
            owner_avatar_url: row.get(6)?,
            source: row.get(7)?,
            created_at: parse_timestamp(row.get::<_, String>(8)?)?,
        })
    }

    fn part_from_row(row: &Row<'_>) -> rusqlite::Result<Part> {
        let status_code: i64 = row.get(4)?;
        Ok(Part {
            part_id: parse_uuid(row.get::<_, String>(0)?)?,
            series_id: parse_uuid(row.get::<_, String>(1)?)?,
            page_number: row.get::<_, i64>(2)? as u32,
            title: row.get(3)?,
            status: PartStatus::from_code(status_code).unwrap_or_default(),
            subtitle: row.get(5)?,
            default_note: row.get(6)?,
            updated_at: parse_timestamp(row.get::<_, String>(7)?)?,
        })
    }

    fn get_part_by_id(conn: &Connection, part_id: Uuid) -> rusqlite::Result<Option<Part>> {
        conn.query_row(
            "SELECT part_id, series_id, page_number, title, status, subtitle, default_note, updated_at
             FROM parts WHERE part_id = ?1",
            params![part_id.to_string()],
            Self::part_from_row,
        )
        .optional()
    }

    fn set_status(&self, part_id: Uuid, status: PartStatus) -> Result<()> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE parts SET status = ?2, updated_at = ?3 WHERE part_id = ?1",
            params![part_id.to_string(), status.code(), Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(TekstError::NotFound(format!("part {}", part_id)));
        }
        Ok(())
    }
}

fn parse_uuid(s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn get_series_by_unique_id(&self, unique_id: &str) -> Result<Option<Series>> {
        let conn = self.lock_conn()?;
        let series = conn
            .query_row(
                "SELECT series_id, unique_id, title, description, thumbnail_url, owner_name,
                        owner_avatar_url, source, created_at
                 FROM series WHERE unique_id = ?1",
                params![unique_id],
                Self::series_from_row,
            )
            .optional()?;
        Ok(series)
    }

    #[instrument(skip(self, series), fields(unique_id = %series.unique_id))]
    async fn create_series(&self, series: NewSeries) -> Result<Series> {
        let row = Series {
            series_id: Uuid::new_v4(),
            unique_id: series.unique_id,
            title: series.title,
            description: series.description,
            thumbnail_url: series.thumbnail_url,
            owner_name: series.owner_name,
            owner_avatar_url: series.owner_avatar_url,
            source: series.source,
            created_at: Utc::now(),
        };

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO series
             (series_id, unique_id, title, description, thumbnail_url, owner_name,
              owner_avatar_url, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.series_id.to_string(),
                row.unique_id,
                row.title,
                row.description,
                row.thumbnail_url,
                row.owner_name,
                row.owner_avatar_url,
                row.source,
                row.created_at.to_rfc3339(),
            ],
        )?;

        Ok(row)
    }

    async fn create_part(&self, part: NewPart) -> Result<Part> {
        let row = Part {
            part_id: Uuid::new_v4(),
            series_id: part.series_id,
            page_number: part.page_number,
            title: part.title,
            status: PartStatus::NotStarted,
            subtitle: None,
            default_note: None,
            updated_at: Utc::now(),
        };

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO parts
             (part_id, series_id, page_number, title, status, subtitle, default_note, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6)",
            params![
                row.part_id.to_string(),
                row.series_id.to_string(),
                row.page_number as i64,
                row.title,
                row.status.code(),
                row.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(row)
    }

    async fn get_part(&self, series_id: Uuid, page_number: u32) -> Result<Option<Part>> {
        let conn = self.lock_conn()?;
        let part = conn
            .query_row(
                "SELECT part_id, series_id, page_number, title, status, subtitle, default_note, updated_at
                 FROM parts WHERE series_id = ?1 AND page_number = ?2",
                params![series_id.to_string(), page_number as i64],
                Self::part_from_row,
            )
            .optional()?;
        Ok(part)
    }

    async fn set_part_subtitle(&self, part_id: Uuid, subtitle_json: &str) -> Result<Part> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE parts SET subtitle = ?2, updated_at = ?3 WHERE part_id = ?1",
            params![
                part_id.to_string(),
                subtitle_json,
                Utc::now().to_rfc3339()
            ],
        )?;
        if updated == 0 {
            return Err(TekstError::NotFound(format!("part {}", part_id)));
        }

        Self::get_part_by_id(&conn, part_id)?
            .ok_or_else(|| TekstError::NotFound(format!("part {}", part_id)))
    }

    async fn begin_part(&self, part_id: Uuid) -> Result<bool> {
        let conn = self.lock_conn()?;
        // Conditional transition: a part already InProgress is not re-claimed.
        let updated = conn.execute(
            "UPDATE parts SET status = ?2, updated_at = ?3
             WHERE part_id = ?1 AND status != ?2",
            params![
                part_id.to_string(),
                PartStatus::InProgress.code(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(updated > 0)
    }

    async fn complete_part(&self, part_id: Uuid) -> Result<()> {
        self.set_status(part_id, PartStatus::Ready)
    }

    async fn reset_part(&self, part_id: Uuid) -> Result<()> {
        self.set_status(part_id, PartStatus::NotStarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_series() -> NewSeries {
        NewSeries {
            unique_id: "BV1wy4y1D7JT".to_string(),
            title: "Test series".to_string(),
            description: Some("desc".to_string()),
            thumbnail_url: None,
            owner_name: Some("owner".to_string()),
            owner_avatar_url: None,
            source: "bilibili".to_string(),
        }
    }

    #[tokio::test]
    async fn test_series_round_trip() {
        let catalog = SqliteCatalog::in_memory().unwrap();

        assert!(catalog
            .get_series_by_unique_id("BV1wy4y1D7JT")
            .await
            .unwrap()
            .is_none());

        let created = catalog.create_series(new_series()).await.unwrap();
        let fetched = catalog
            .get_series_by_unique_id("BV1wy4y1D7JT")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.series_id, created.series_id);
        assert_eq!(fetched.title, "Test series");
        assert_eq!(fetched.owner_name.as_deref(), Some("owner"));
    }

    #[tokio::test]
    async fn test_part_lifecycle() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let series = catalog.create_series(new_series()).await.unwrap();

        let part = catalog
            .create_part(NewPart {
                series_id: series.series_id,
                page_number: 3,
                title: "Part three".to_string(),
            })
            .await
            .unwrap();

        let fetched = catalog.get_part(series.series_id, 3).await.unwrap().unwrap();
        assert_eq!(fetched.part_id, part.part_id);
        assert_eq!(fetched.status, PartStatus::NotStarted);
        assert!(fetched.subtitle.is_none());

        let updated = catalog
            .set_part_subtitle(part.part_id, r#"[{"lan":"zh-CN","subtitle":[]}]"#)
            .await
            .unwrap();
        assert!(updated.subtitle.is_some());
    }

    #[tokio::test]
    async fn test_begin_is_conditional() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let series = catalog.create_series(new_series()).await.unwrap();
        let part = catalog
            .create_part(NewPart {
                series_id: series.series_id,
                page_number: 1,
                title: "p1".to_string(),
            })
            .await
            .unwrap();

        assert!(catalog.begin_part(part.part_id).await.unwrap());
        // Second claim while InProgress loses.
        assert!(!catalog.begin_part(part.part_id).await.unwrap());

        catalog.complete_part(part.part_id).await.unwrap();
        let fetched = catalog.get_part(series.series_id, 1).await.unwrap().unwrap();
        assert_eq!(fetched.status, PartStatus::Ready);

        catalog.reset_part(part.part_id).await.unwrap();
        let fetched = catalog.get_part(series.series_id, 1).await.unwrap().unwrap();
        assert_eq!(fetched.status, PartStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_duplicate_page_rejected() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let series = catalog.create_series(new_series()).await.unwrap();

        let new_part = NewPart {
            series_id: series.series_id,
            page_number: 1,
            title: "p1".to_string(),
        };
        catalog.create_part(new_part.clone()).await.unwrap();
        assert!(catalog.create_part(new_part).await.is_err());
    }
}
