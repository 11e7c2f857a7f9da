//! Platform-native caption retrieval.

use crate::config::{CaptionSettings, PlatformSettings};
use crate::error::{Result, TekstError};
use crate::retry::RetryPolicy;
use crate::subtitle::{Cue, SubtitleTrack};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct PlayerEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<PlayerData>,
}

#[derive(Debug, Deserialize)]
struct PlayerData {
    #[serde(default)]
    subtitle: Option<SubtitleListing>,
}

#[derive(Debug, Deserialize)]
struct SubtitleListing {
    #[serde(default)]
    subtitles: Vec<CaptionEntry>,
}

/// One caption language advertised by the player endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptionEntry {
    /// Human-readable language label.
    #[serde(default)]
    pub lan_doc: String,
    /// Primary content URL, possibly protocol-relative.
    #[serde(default)]
    pub subtitle_url: Option<String>,
    /// Secondary content URL, advertised by some entries.
    #[serde(default)]
    pub subtitle_url_v2: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionBody {
    body: Vec<Cue>,
}

/// Source of platform-authored caption tracks.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch every retrievable caption track for a part.
    ///
    /// Returns `None` when no track could be retrieved after exhausting
    /// retries; callers must treat that as "fall through to synthesis", not as
    /// a hard error.
    async fn fetch(
        &self,
        aid: u64,
        cid: u64,
        credential: &str,
    ) -> Result<Option<Vec<SubtitleTrack>>>;
}

/// Raw wire access for the caption endpoints, separated from the listing walk
/// and retry logic so those stay testable without a live platform.
#[async_trait]
pub trait CaptionTransport: Send + Sync {
    /// Query the caption listing for a part.
    async fn list(&self, aid: u64, cid: u64, credential: &str) -> Result<Vec<CaptionEntry>>;

    /// Download and parse one content URL.
    async fn content(&self, content_url: &str, credential: &str) -> Result<Vec<Cue>>;
}

/// HTTP transport backed by the platform's player endpoint.
pub struct HttpCaptionTransport {
    client: reqwest::Client,
    api_base: String,
    referer: String,
}

impl HttpCaptionTransport {
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
impl CaptionTransport for HttpCaptionTransport {
    async fn list(&self, aid: u64, cid: u64, credential: &str) -> Result<Vec<CaptionEntry>> {
        let url = format!("{}/x/player/wbi/v2?aid={}&cid={}", self.api_base, aid, cid);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, &self.referer)
            .header(reqwest::header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9")
            .header(reqwest::header::COOKIE, credential)
            .send()
            .await
            .map_err(|e| TekstError::UpstreamUnavailable(format!("caption listing: {}", e)))?;

        if !response.status().is_success() {
            return Err(TekstError::UpstreamUnavailable(format!(
                "caption listing returned {}",
                response.status()
            )));
        }

        let envelope: PlayerEnvelope = response
            .json()
            .await
            .map_err(|e| TekstError::UpstreamSchema(format!("caption listing body: {}", e)))?;

        if envelope.code != 0 {
            return Err(TekstError::UpstreamLogical {
                code: envelope.code,
                message: envelope.message,
            });
        }

        Ok(envelope
            .data
            .and_then(|d| d.subtitle)
            .map(|s| s.subtitles)
            .unwrap_or_default())
    }

    async fn content(&self, content_url: &str, credential: &str) -> Result<Vec<Cue>> {
        let url = normalize_caption_url(content_url);

        let body: CaptionBody = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, &self.referer)
            .header(reqwest::header::COOKIE, credential)
            .send()
            .await
            .map_err(|e| TekstError::UpstreamUnavailable(format!("caption content: {}", e)))?
            .error_for_status()
            .map_err(|e| TekstError::UpstreamUnavailable(format!("caption content: {}", e)))?
            .json()
            .await
            .map_err(|e| TekstError::UpstreamSchema(format!("caption content body: {}", e)))?;

        Ok(body.body)
    }
}

/// Caption fetcher: listing walk, per-entry URL fallback, bounded retry.
pub struct BilibiliCaptions {
    transport: Arc<dyn CaptionTransport>,
    retry: RetryPolicy,
}

impl BilibiliCaptions {
    pub fn with_config(platform: &PlatformSettings, captions: &CaptionSettings) -> Result<Self> {
        Ok(Self::with_transport(
            Arc::new(HttpCaptionTransport::with_config(platform)?),
            RetryPolicy::new(
                captions.max_retries,
                Duration::from_millis(captions.retry_delay_ms),
            ),
        ))
    }

    /// Build a fetcher over a custom transport.
    pub fn with_transport(transport: Arc<dyn CaptionTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Resolve one entry, trying the primary URL first and the v2 URL only on
    /// failure. Returns None when both fail.
    async fn fetch_entry(&self, entry: &CaptionEntry, credential: &str) -> Option<SubtitleTrack> {
        let candidates = [entry.subtitle_url.as_deref(), entry.subtitle_url_v2.as_deref()];

        for candidate in candidates.into_iter().flatten() {
            if candidate.is_empty() {
                continue;
            }
            match self.transport.content(candidate, credential).await {
                Ok(cues) => {
                    return Some(SubtitleTrack {
                        language_label: entry.lan_doc.clone(),
                        cues,
                    });
                }
                Err(e) => {
                    warn!("Caption content for '{}' failed: {}", entry.lan_doc, e);
                }
            }
        }
        None
    }

    /// One full attempt: list, then resolve every advertised language.
    async fn attempt(&self, aid: u64, cid: u64, credential: &str) -> Result<Vec<SubtitleTrack>> {
        let entries = self.transport.list(aid, cid, credential).await?;
        if entries.is_empty() {
            return Err(TekstError::UpstreamUnavailable(
                "caption listing is empty".into(),
            ));
        }

        let mut tracks = Vec::new();
        for entry in &entries {
            // Per-language failures are absorbed; partial coverage is fine.
            if let Some(track) = self.fetch_entry(entry, credential).await {
                tracks.push(track);
            }
        }

        if tracks.is_empty() {
            return Err(TekstError::UpstreamUnavailable(
                "no caption language yielded content".into(),
            ));
        }
        Ok(tracks)
    }
}

#[async_trait]
impl CaptionSource for BilibiliCaptions {
    #[instrument(skip(self, credential))]
    async fn fetch(
        &self,
        aid: u64,
        cid: u64,
        credential: &str,
    ) -> Result<Option<Vec<SubtitleTrack>>> {
        match self.retry.run(|| self.attempt(aid, cid, credential)).await {
            Ok(tracks) => {
                info!("Retrieved {} native caption track(s)", tracks.len());
                Ok(Some(tracks))
            }
            Err(e) => {
                debug!("Native captions unavailable: {}", e);
                Ok(None)
            }
        }
    }
}

/// Content URLs are often protocol-relative (`//host/path`).
fn normalize_caption_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport serving a fixed listing, with content URLs that fail unless
    /// they appear in the `good` set.
    struct CannedTransport {
        entries: Vec<CaptionEntry>,
        good: Vec<&'static str>,
        list_calls: AtomicUsize,
        content_calls: AtomicUsize,
    }

    impl CannedTransport {
        fn new(entries: Vec<CaptionEntry>, good: Vec<&'static str>) -> Self {
            Self {
                entries,
                good,
                list_calls: AtomicUsize::new(0),
                content_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CaptionTransport for CannedTransport {
        async fn list(&self, _: u64, _: u64, _: &str) -> Result<Vec<CaptionEntry>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.clone())
        }

        async fn content(&self, content_url: &str, _: &str) -> Result<Vec<Cue>> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            if self.good.contains(&content_url) {
                let body: CaptionBody =
                    serde_json::from_str(r#"{"body":[{"from":0,"to":1.2,"content":"hi"}]}"#)?;
                Ok(body.body)
            } else {
                Err(TekstError::UpstreamUnavailable("404 Not Found".into()))
            }
        }
    }

    fn entry(lan: &str, primary: Option<&str>, v2: Option<&str>) -> CaptionEntry {
        CaptionEntry {
            lan_doc: lan.to_string(),
            subtitle_url: primary.map(str::to_string),
            subtitle_url_v2: v2.map(str::to_string),
        }
    }

    fn fetcher(transport: Arc<dyn CaptionTransport>) -> BilibiliCaptions {
        BilibiliCaptions::with_transport(transport, RetryPolicy::new(3, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_failed_primary_falls_back_to_v2() {
        let transport = Arc::new(CannedTransport::new(
            vec![entry(
                "中文（自动生成）",
                Some("//example.com/zh.json"),
                Some("//example.com/zh.v2.json"),
            )],
            vec!["//example.com/zh.v2.json"],
        ));
        let captions = fetcher(transport.clone());

        let tracks = captions.fetch(1, 2, "cookie").await.unwrap().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].language_label, "中文（自动生成）");
        assert_eq!(tracks[0].cues.len(), 1);
        assert_eq!(tracks[0].cues[0].start_seconds, 0.0);
        assert_eq!(tracks[0].cues[0].end_seconds, 1.2);
        assert_eq!(tracks[0].cues[0].text, "hi");
        // Primary tried, then v2; the first attempt succeeded so no retry.
        assert_eq!(transport.content_calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_v2_not_tried_when_primary_succeeds() {
        let transport = Arc::new(CannedTransport::new(
            vec![entry(
                "English",
                Some("//example.com/en.json"),
                Some("//example.com/en.v2.json"),
            )],
            vec!["//example.com/en.json"],
        ));
        let captions = fetcher(transport.clone());

        let tracks = captions.fetch(1, 2, "cookie").await.unwrap().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(transport.content_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_per_language_failure_absorbed() {
        let transport = Arc::new(CannedTransport::new(
            vec![
                entry("中文", Some("//example.com/zh.json"), None),
                entry("English", Some("//example.com/en.json"), None),
            ],
            vec!["//example.com/en.json"],
        ));
        let captions = fetcher(transport);

        // One language fails both URLs; the other still comes back.
        let tracks = captions.fetch(1, 2, "cookie").await.unwrap().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].language_label, "English");
    }

    #[tokio::test]
    async fn test_empty_listing_retries_then_none() {
        let transport = Arc::new(CannedTransport::new(vec![], vec![]));
        let captions = fetcher(transport.clone());

        let result = captions.fetch(1, 2, "cookie").await.unwrap();
        assert!(result.is_none());
        // Every attempt in the budget re-queried the listing.
        assert_eq!(transport.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_all_languages_failing_returns_none() {
        let transport = Arc::new(CannedTransport::new(
            vec![entry("中文", Some("//example.com/zh.json"), None)],
            vec![],
        ));
        let captions = fetcher(transport);

        let result = captions.fetch(1, 2, "cookie").await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_normalize_protocol_relative() {
        assert_eq!(
            normalize_caption_url("//i0.example.com/bfs/subtitle/a.json"),
            "https://i0.example.com/bfs/subtitle/a.json"
        );
        assert_eq!(
            normalize_caption_url("https://i0.example.com/a.json"),
            "https://i0.example.com/a.json"
        );
    }

    #[test]
    fn test_listing_parses_entries() {
        let envelope: PlayerEnvelope = serde_json::from_value(serde_json::json!({
            "code": 0,
            "message": "0",
            "data": {
                "subtitle": {
                    "subtitles": [
                        {
                            "lan_doc": "中文（自动生成）",
                            "subtitle_url": "//example.com/zh.json",
                            "subtitle_url_v2": "//example.com/zh.v2.json"
                        },
                        { "lan_doc": "English", "subtitle_url": "//example.com/en.json" }
                    ]
                }
            }
        }))
        .unwrap();

        let entries = envelope.data.unwrap().subtitle.unwrap().subtitles;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lan_doc, "中文（自动生成）");
        assert!(entries[1].subtitle_url_v2.is_none());
    }

    #[test]
    fn test_listing_without_subtitle_block_is_empty() {
        let envelope: PlayerEnvelope = serde_json::from_value(serde_json::json!({
            "code": 0,
            "data": {}
        }))
        .unwrap();
        let entries = envelope
            .data
            .and_then(|d| d.subtitle)
            .map(|s| s.subtitles)
            .unwrap_or_default();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_caption_body_parses_cues() {
        let body: CaptionBody = serde_json::from_str(
            r#"{"body":[{"from":0,"to":1.2,"content":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(body.body.len(), 1);
        assert_eq!(body.body[0].text, "hi");
        assert_eq!(body.body[0].end_seconds, 1.2);
    }
}
