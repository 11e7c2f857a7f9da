//! Idempotent video materialization.

use super::paths;
use crate::config::PlatformSettings;
use crate::error::{Result, TekstError};
use crate::platform::DownloadSource;
use crate::store::Catalog;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Materializes the raw video artifact for a part, at most once.
///
/// The deterministic artifact path acts as a cache: an existing file is
/// returned as a no-op read with no status transition. Fresh downloads are
/// bracketed by the part status machine and serialized per artifact through an
/// in-process lock map, so two requests for the same part cannot download
/// twice. A part already claimed `InProgress` by someone outside this process
/// is treated as contended rather than re-claimed.
pub struct VideoAcquirer {
    media_root: PathBuf,
    client: reqwest::Client,
    downloads: Arc<dyn DownloadSource>,
    catalog: Arc<dyn Catalog>,
    referer: String,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl VideoAcquirer {
    pub fn with_config(
        settings: &PlatformSettings,
        media_root: PathBuf,
        downloads: Arc<dyn DownloadSource>,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            media_root,
            client,
            downloads,
            catalog,
            referer: settings.referer.clone(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Ensure the video artifact for a part exists on disk and return its path.
    #[instrument(skip(self, credential, part_id), fields(series_id = %series_id, page = page_number))]
    pub async fn ensure_video(
        &self,
        series_id: &str,
        page_number: u32,
        aid: u64,
        cid: u64,
        credential: &str,
        part_id: Uuid,
    ) -> Result<PathBuf> {
        let path = paths::video_path(&self.media_root, series_id, page_number);

        if path.exists() {
            debug!("Video artifact already present");
            return Ok(path);
        }

        let lock = self.lock_for(&paths::artifact_stem(series_id, page_number));
        let _guard = lock.lock().await;

        // A concurrent request may have finished while we waited.
        if path.exists() {
            debug!("Video artifact appeared while waiting for lock");
            return Ok(path);
        }

        std::fs::create_dir_all(&self.media_root)?;

        if !self.catalog.begin_part(part_id).await? {
            return Err(TekstError::Download(
                "another materialization of this part is in progress".into(),
            ));
        }

        match self.download(&path, aid, cid, credential).await {
            Ok(()) => {
                self.catalog.complete_part(part_id).await?;
                info!("Video artifact materialized at {:?}", path);
                Ok(path)
            }
            Err(e) => {
                if let Err(reset_err) = self.catalog.reset_part(part_id).await {
                    warn!("Failed to reset part status: {}", reset_err);
                }
                Err(e)
            }
        }
    }

    /// Resolve a short-lived URL and stream it to `path` via a temporary file.
    async fn download(&self, path: &Path, aid: u64, cid: u64, credential: &str) -> Result<()> {
        let resolved = self
            .downloads
            .resolve(aid, cid, credential)
            .await
            .map_err(|e| TekstError::Download(format!("download resolution failed: {}", e)))?;

        if let Some(quality) = &resolved.quality {
            debug!("Resolved download URL (quality {})", quality);
        }

        let temp_path = path.with_extension("mp4.part");
        let result = self.stream_to(&resolved.url, &temp_path, credential).await;

        match result {
            Ok(()) => {
                tokio::fs::rename(&temp_path, path)
                    .await
                    .map_err(|e| TekstError::Download(format!("rename failed: {}", e)))?;
                Ok(())
            }
            Err(e) => {
                // Never leave a partial file the existence check would trust.
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, dest: &Path, credential: &str) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, &self.referer)
            .header(reqwest::header::COOKIE, credential)
            .header(reqwest::header::RANGE, "bytes=0-")
            .send()
            .await
            .map_err(|e| TekstError::Download(format!("stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(TekstError::Download(format!(
                "stream returned {}",
                response.status()
            )));
        }

        let progress = response.content_length().map(|len| {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.green} Download  [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            pb
        });

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| TekstError::Download(format!("cannot create {:?}: {}", dest, e)))?;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TekstError::Download(format!("stream read failed: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| TekstError::Download(format!("write failed: {}", e)))?;
            if let Some(pb) = &progress {
                pb.inc(chunk.len() as u64);
            }
        }

        file.flush()
            .await
            .map_err(|e| TekstError::Download(format!("flush failed: {}", e)))?;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        Ok(())
    }
}
