//! Download-URL resolution.
//!
//! The platform hands out short-lived, credential-bound URLs for raw video
//! streams through a separate resolution endpoint; the acquirer asks for one
//! right before streaming.

use crate::config::PlatformSettings;
use crate::error::{Result, TekstError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Serialize)]
struct ResolveRequest<'a> {
    aid: u64,
    cid: u64,
    cookie: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResolveEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<ResolveData>,
}

#[derive(Debug, Deserialize)]
struct ResolveData {
    #[serde(default)]
    durl: Vec<DurlEntry>,
    quality: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DurlEntry {
    url: String,
}

/// A resolved, short-lived download location.
#[derive(Debug, Clone)]
pub struct ResolvedDownload {
    pub url: String,
    /// Quality tag as reported by the resolver, if any.
    pub quality: Option<String>,
}

/// Source of resolved download URLs.
#[async_trait]
pub trait DownloadSource: Send + Sync {
    async fn resolve(&self, aid: u64, cid: u64, credential: &str) -> Result<ResolvedDownload>;
}

/// Download resolver backed by the platform's resolution endpoint.
pub struct BilibiliDownloads {
    client: reqwest::Client,
    resolver_url: String,
}

impl BilibiliDownloads {
    pub fn with_config(settings: &PlatformSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            resolver_url: settings.download_resolver.clone(),
        })
    }
}

#[async_trait]
impl DownloadSource for BilibiliDownloads {
    #[instrument(skip(self, credential))]
    async fn resolve(&self, aid: u64, cid: u64, credential: &str) -> Result<ResolvedDownload> {
        let response = self
            .client
            .post(&self.resolver_url)
            .json(&ResolveRequest {
                aid,
                cid,
                cookie: credential,
            })
            .send()
            .await
            .map_err(|e| TekstError::UpstreamUnavailable(format!("download resolution: {}", e)))?;

        if !response.status().is_success() {
            return Err(TekstError::UpstreamUnavailable(format!(
                "download resolver returned {}",
                response.status()
            )));
        }

        let envelope: ResolveEnvelope = response
            .json()
            .await
            .map_err(|e| TekstError::UpstreamSchema(format!("download resolution body: {}", e)))?;

        if envelope.code != 0 {
            return Err(TekstError::UpstreamLogical {
                code: envelope.code,
                message: envelope.message,
            });
        }

        let data = envelope
            .data
            .ok_or_else(|| TekstError::UpstreamSchema("resolution response missing data".into()))?;

        let url = data
            .durl
            .first()
            .map(|d| d.url.clone())
            .ok_or_else(|| TekstError::UpstreamSchema("resolution response has no durl".into()))?;

        // Quality may arrive as a number or a string; keep it as display text.
        let quality = data.quality.map(|q| match q {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        Ok(ResolvedDownload { url, quality })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parses_durl() {
        let envelope: ResolveEnvelope = serde_json::from_value(serde_json::json!({
            "code": 0,
            "message": "",
            "data": {
                "durl": [ { "url": "https://cdn.example.com/video.mp4?expires=123" } ],
                "quality": 64
            }
        }))
        .unwrap();

        let data = envelope.data.unwrap();
        assert_eq!(data.durl[0].url, "https://cdn.example.com/video.mp4?expires=123");
        assert_eq!(data.quality.unwrap(), serde_json::json!(64));
    }

    #[test]
    fn test_error_envelope() {
        let envelope: ResolveEnvelope = serde_json::from_value(serde_json::json!({
            "code": -101,
            "message": "账号未登录"
        }))
        .unwrap();
        assert_eq!(envelope.code, -101);
        assert!(envelope.data.is_none());
    }
}
