//! Catalog abstraction for series and part rows.
//!
//! The resolver only needs a narrow row-level surface: get-by-identity, create,
//! and partial update. The trait keeps that surface mockable; `SqliteCatalog`
//! is the real backend and `MemoryCatalog` backs tests.

mod memory;
mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acquisition state of a part's video artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PartStatus {
    /// No materialization attempted, or the last attempt failed.
    #[default]
    NotStarted,
    /// A download is underway.
    InProgress,
    /// The video artifact was verified on disk.
    Ready,
}

impl PartStatus {
    /// Integer code stored in the catalog.
    pub fn code(&self) -> i64 {
        match self {
            PartStatus::NotStarted => 0,
            PartStatus::InProgress => 1,
            PartStatus::Ready => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PartStatus::NotStarted),
            1 => Some(PartStatus::InProgress),
            2 => Some(PartStatus::Ready),
            _ => None,
        }
    }
}

/// A video's top-level metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    /// Surrogate key.
    pub series_id: Uuid,
    /// Platform-assigned public ID (e.g. a BV number).
    pub unique_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub owner_name: Option<String>,
    pub owner_avatar_url: Option<String>,
    /// Platform tag (e.g. "bilibili").
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a series row.
#[derive(Debug, Clone)]
pub struct NewSeries {
    pub unique_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub owner_name: Option<String>,
    pub owner_avatar_url: Option<String>,
    pub source: String,
}

/// One numbered sub-video within a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    /// Surrogate key.
    pub part_id: Uuid,
    pub series_id: Uuid,
    /// 1-based page number, matching platform part numbering.
    pub page_number: u32,
    pub title: String,
    pub status: PartStatus,
    /// Serialized subtitle track set, once resolved.
    pub subtitle: Option<String>,
    /// Cached generated text; written by external collaborators only.
    pub default_note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a part row.
#[derive(Debug, Clone)]
pub struct NewPart {
    pub series_id: Uuid,
    pub page_number: u32,
    pub title: String,
}

/// Row-level CRUD surface the pipeline depends on.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a series by its platform public ID.
    async fn get_series_by_unique_id(&self, unique_id: &str) -> Result<Option<Series>>;

    /// Create a series row. `unique_id` must be unused.
    async fn create_series(&self, series: NewSeries) -> Result<Series>;

    /// Create a part row. (series, page_number) must be unused.
    async fn create_part(&self, part: NewPart) -> Result<Part>;

    /// Look up a part by series and 1-based page number.
    async fn get_part(&self, series_id: Uuid, page_number: u32) -> Result<Option<Part>>;

    /// Store the serialized subtitle track set for a part.
    async fn set_part_subtitle(&self, part_id: Uuid, subtitle_json: &str) -> Result<Part>;

    /// Conditionally move a part to `InProgress`.
    ///
    /// Returns false when the part is already `InProgress`, so concurrent
    /// materializations of the same part cannot both win the transition.
    async fn begin_part(&self, part_id: Uuid) -> Result<bool>;

    /// Mark a part `Ready`. Call only after the artifact is verified on disk.
    async fn complete_part(&self, part_id: Uuid) -> Result<()>;

    /// Reset a part to `NotStarted` after a failed materialization.
    async fn reset_part(&self, part_id: Uuid) -> Result<()>;
}
