//! Series metadata retrieval.

use crate::config::PlatformSettings;
use crate::error::{Result, TekstError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Envelope every platform API response arrives in.
#[derive(Debug, Deserialize)]
struct ViewEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<VideoView>,
}

/// Metadata record for one series, as reported by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoView {
    pub bvid: String,
    pub aid: u64,
    /// Media identifier of the first part.
    pub cid: u64,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    /// Thumbnail URL.
    #[serde(default)]
    pub pic: String,
    pub owner: OwnerInfo,
    #[serde(default)]
    pub pages: Vec<PageInfo>,
}

/// Series owner info.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerInfo {
    pub name: String,
    /// Avatar URL.
    #[serde(default)]
    pub face: String,
}

/// Per-part metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    pub cid: u64,
    /// 1-based part number.
    pub page: u32,
    /// Part title.
    pub part: String,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: u64,
}

impl VideoView {
    /// Resolve the (aid, cid) media identifiers for a 1-based page number.
    ///
    /// Single-part videos may report an empty page list; the top-level cid
    /// addresses the only part in that case.
    pub fn media_ids(&self, page_number: u32) -> Result<(u64, u64)> {
        if self.pages.is_empty() {
            return Ok((self.aid, self.cid));
        }
        let page = self
            .pages
            .iter()
            .find(|p| p.page == page_number)
            .ok_or_else(|| {
                TekstError::NotFound(format!(
                    "video {} has {} parts, part {} does not exist",
                    self.bvid,
                    self.pages.len(),
                    page_number
                ))
            })?;
        Ok((self.aid, page.cid))
    }
}

/// Source of series metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch the metadata record for a series by its platform public ID.
    async fn fetch(&self, series_id: &str) -> Result<VideoView>;
}

/// Metadata fetcher backed by the platform's view endpoint.
pub struct BilibiliMetadata {
    client: reqwest::Client,
    api_base: String,
    referer: String,
}

impl BilibiliMetadata {
    pub fn with_config(settings: &PlatformSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            referer: settings.referer.clone(),
        })
    }
}

#[async_trait]
impl MetadataSource for BilibiliMetadata {
    #[instrument(skip(self))]
    async fn fetch(&self, series_id: &str) -> Result<VideoView> {
        let url = format!("{}/x/web-interface/view?bvid={}", self.api_base, series_id);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, &self.referer)
            .send()
            .await
            .map_err(|e| TekstError::UpstreamUnavailable(format!("metadata request: {}", e)))?;

        if !response.status().is_success() {
            return Err(TekstError::UpstreamUnavailable(format!(
                "metadata endpoint returned {}",
                response.status()
            )));
        }

        let envelope: ViewEnvelope = response
            .json()
            .await
            .map_err(|e| TekstError::UpstreamSchema(format!("metadata body: {}", e)))?;

        if envelope.code != 0 {
            return Err(TekstError::UpstreamLogical {
                code: envelope.code,
                message: envelope.message,
            });
        }

        let view = envelope
            .data
            .ok_or_else(|| TekstError::UpstreamSchema("metadata response missing data".into()))?;

        debug!("Fetched metadata for {} ({} parts)", view.bvid, view.pages.len());
        Ok(view)
    }
}
