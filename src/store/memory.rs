//! In-memory catalog implementation.
//!
//! Useful for testing the resolver without a database file.

use super::{Catalog, NewPart, NewSeries, Part, PartStatus, Series};
use crate::error::{Result, TekstError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory catalog.
#[derive(Default)]
pub struct MemoryCatalog {
    series: RwLock<HashMap<Uuid, Series>>,
    parts: RwLock<HashMap<Uuid, Part>>,
}

impl MemoryCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_series_by_unique_id(&self, unique_id: &str) -> Result<Option<Series>> {
        let series = self.series.read().unwrap();
        Ok(series.values().find(|s| s.unique_id == unique_id).cloned())
    }

    async fn create_series(&self, series: NewSeries) -> Result<Series> {
        let mut store = self.series.write().unwrap();
        if store.values().any(|s| s.unique_id == series.unique_id) {
            return Err(TekstError::Store(format!(
                "series {} already exists",
                series.unique_id
            )));
        }

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
        store.insert(row.series_id, row.clone());
        Ok(row)
    }

    async fn create_part(&self, part: NewPart) -> Result<Part> {
        let mut parts = self.parts.write().unwrap();
        if parts
            .values()
            .any(|p| p.series_id == part.series_id && p.page_number == part.page_number)
        {
            return Err(TekstError::Store(format!(
                "page {} already exists for series {}",
                part.page_number, part.series_id
            )));
        }

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
        parts.insert(row.part_id, row.clone());
        Ok(row)
    }

    async fn get_part(&self, series_id: Uuid, page_number: u32) -> Result<Option<Part>> {
        let parts = self.parts.read().unwrap();
        Ok(parts
            .values()
            .find(|p| p.series_id == series_id && p.page_number == page_number)
            .cloned())
    }

    async fn set_part_subtitle(&self, part_id: Uuid, subtitle_json: &str) -> Result<Part> {
        let mut parts = self.parts.write().unwrap();
        let part = parts
            .get_mut(&part_id)
            .ok_or_else(|| TekstError::NotFound(format!("part {}", part_id)))?;
        part.subtitle = Some(subtitle_json.to_string());
        part.updated_at = Utc::now();
        Ok(part.clone())
    }

    async fn begin_part(&self, part_id: Uuid) -> Result<bool> {
        let mut parts = self.parts.write().unwrap();
        let part = parts
            .get_mut(&part_id)
            .ok_or_else(|| TekstError::NotFound(format!("part {}", part_id)))?;
        if part.status == PartStatus::InProgress {
            return Ok(false);
        }
        part.status = PartStatus::InProgress;
        part.updated_at = Utc::now();
        Ok(true)
    }

    async fn complete_part(&self, part_id: Uuid) -> Result<()> {
        let mut parts = self.parts.write().unwrap();
        let part = parts
            .get_mut(&part_id)
            .ok_or_else(|| TekstError::NotFound(format!("part {}", part_id)))?;
        part.status = PartStatus::Ready;
        part.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_part(&self, part_id: Uuid) -> Result<()> {
        let mut parts = self.parts.write().unwrap();
        let part = parts
            .get_mut(&part_id)
            .ok_or_else(|| TekstError::NotFound(format!("part {}", part_id)))?;
        part.status = PartStatus::NotStarted;
        part.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_matches_sqlite_semantics() {
        let catalog = MemoryCatalog::new();
        let series = catalog
            .create_series(NewSeries {
                unique_id: "BVxxxxxxxxxx".to_string(),
                title: "t".to_string(),
                description: None,
                thumbnail_url: None,
                owner_name: None,
                owner_avatar_url: None,
                source: "bilibili".to_string(),
            })
            .await
            .unwrap();

        let part = catalog
            .create_part(NewPart {
                series_id: series.series_id,
                page_number: 1,
                title: "p1".to_string(),
            })
            .await
            .unwrap();

        assert!(catalog.begin_part(part.part_id).await.unwrap());
        assert!(!catalog.begin_part(part.part_id).await.unwrap());

        catalog.reset_part(part.part_id).await.unwrap();
        assert!(catalog.begin_part(part.part_id).await.unwrap());

        catalog.complete_part(part.part_id).await.unwrap();
        let fetched = catalog.get_part(series.series_id, 1).await.unwrap().unwrap();
        assert_eq!(fetched.status, PartStatus::Ready);
    }
}
