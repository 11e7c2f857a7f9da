//! Subtitle resolution orchestrator.
//!
//! Composes the layered fallback chain: previously persisted result →
//! platform-native captions → download + audio extraction + VAD + recognition.
//! Owns the end-to-end contract: exactly one subtitle track set per part,
//! persisted for idempotent reuse, and the synthesis branch never runs when a
//! cheaper branch produced a result.

use crate::config::Settings;
use crate::error::{Result, TekstError};
use crate::media::pcm::{AudioInterval, PcmAudio};
use crate::media::{self, VideoAcquirer};
use crate::platform::{
    extract_series_and_page, BilibiliCaptions, BilibiliDownloads, BilibiliMetadata, CaptionSource,
    MetadataSource, VideoView,
};
use crate::recognition::{EnergyVad, HttpRecognizer, Transcriber};
use crate::store::{Catalog, NewPart, NewSeries, Part, Series};
use crate::subtitle::{self, SubtitleTrack};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Platform tag stored on series created by this resolver.
const SOURCE_TAG: &str = "bilibili";

/// The main resolver for the Tekst pipeline.
pub struct SubtitleResolver {
    catalog: Arc<dyn Catalog>,
    metadata: Arc<dyn MetadataSource>,
    captions: Arc<dyn CaptionSource>,
    acquirer: VideoAcquirer,
    segmenter: EnergyVad,
    transcriber: Transcriber,
    max_concurrent_intervals: usize,
}

impl SubtitleResolver {
    /// Create a resolver with the default component wiring.
    pub fn new(settings: &Settings, catalog: Arc<dyn Catalog>) -> Result<Self> {
        let metadata = Arc::new(BilibiliMetadata::with_config(&settings.platform)?);
        let captions = Arc::new(BilibiliCaptions::with_config(
            &settings.platform,
            &settings.captions,
        )?);
        let downloads = Arc::new(BilibiliDownloads::with_config(&settings.platform)?);
        let acquirer = VideoAcquirer::with_config(
            &settings.platform,
            settings.media_dir(),
            downloads,
            catalog.clone(),
        )?;
        let segmenter = EnergyVad::with_config(&settings.segmentation);
        let recognizer = Arc::new(HttpRecognizer::with_config(&settings.recognition)?);
        let transcriber = Transcriber::new(recognizer);

        Ok(Self {
            catalog,
            metadata,
            captions,
            acquirer,
            segmenter,
            transcriber,
            max_concurrent_intervals: settings.recognition.max_concurrent_intervals.max(1),
        })
    }

    /// Create a resolver with custom components.
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        catalog: Arc<dyn Catalog>,
        metadata: Arc<dyn MetadataSource>,
        captions: Arc<dyn CaptionSource>,
        acquirer: VideoAcquirer,
        segmenter: EnergyVad,
        transcriber: Transcriber,
        max_concurrent_intervals: usize,
    ) -> Self {
        Self {
            catalog,
            metadata,
            captions,
            acquirer,
            segmenter,
            transcriber,
            max_concurrent_intervals: max_concurrent_intervals.max(1),
        }
    }

    /// Resolve the subtitle track set for a video URL.
    pub async fn resolve_url(&self, url: &str, credential: &str) -> Result<Vec<SubtitleTrack>> {
        let (series_id, page) = extract_series_and_page(url)?;
        self.resolve(&series_id, page, credential).await
    }

    /// Resolve the subtitle track set for (series, page).
    #[instrument(skip(self, credential))]
    pub async fn resolve(
        &self,
        series_id: &str,
        page_number: u32,
        credential: &str,
    ) -> Result<Vec<SubtitleTrack>> {
        // Cached result: no network calls at all.
        if let Some(series) = self.catalog.get_series_by_unique_id(series_id).await? {
            if let Some(part) = self.catalog.get_part(series.series_id, page_number).await? {
                if let Some(json) = &part.subtitle {
                    info!("Returning previously resolved subtitle");
                    return Ok(serde_json::from_str(json)?);
                }
            }
        }

        let view = self.metadata.fetch(series_id).await?;
        let series = self.ensure_series(series_id, &view).await?;
        let part = self
            .catalog
            .get_part(series.series_id, page_number)
            .await?
            .ok_or_else(|| {
                TekstError::NotFound(format!(
                    "part {} of series {} does not exist",
                    page_number, series_id
                ))
            })?;

        let (aid, cid) = view.media_ids(page_number)?;

        // Native captions beat synthesis whenever any language is retrievable.
        if let Some(tracks) = self.captions.fetch(aid, cid, credential).await? {
            if !tracks.is_empty() {
                info!("Using {} native caption track(s)", tracks.len());
                return self.persist(&part, tracks).await;
            }
        }

        info!("No native captions; synthesizing from audio");
        let track = self
            .synthesize(series_id, page_number, aid, cid, credential, &part)
            .await?;
        self.persist(&part, vec![track]).await
    }

    /// Create the series and its parts on first sight.
    async fn ensure_series(&self, series_id: &str, view: &VideoView) -> Result<Series> {
        if let Some(series) = self.catalog.get_series_by_unique_id(series_id).await? {
            return Ok(series);
        }

        let series = self
            .catalog
            .create_series(NewSeries {
                unique_id: series_id.to_string(),
                title: view.title.clone(),
                description: Some(view.desc.clone()),
                thumbnail_url: Some(view.pic.clone()),
                owner_name: Some(view.owner.name.clone()),
                owner_avatar_url: Some(view.owner.face.clone()),
                source: SOURCE_TAG.to_string(),
            })
            .await?;

        if view.pages.is_empty() {
            // Single-part videos may report no page list.
            self.catalog
                .create_part(NewPart {
                    series_id: series.series_id,
                    page_number: 1,
                    title: view.title.clone(),
                })
                .await?;
        } else {
            for page in &view.pages {
                self.catalog
                    .create_part(NewPart {
                        series_id: series.series_id,
                        page_number: page.page,
                        title: page.part.clone(),
                    })
                    .await?;
            }
        }

        info!(
            "Created series {} with {} part(s)",
            series_id,
            view.pages.len().max(1)
        );
        Ok(series)
    }

    /// The synthesis branch: materialize video, extract audio, segment,
    /// transcribe, assemble.
    async fn synthesize(
        &self,
        series_id: &str,
        page_number: u32,
        aid: u64,
        cid: u64,
        credential: &str,
        part: &Part,
    ) -> Result<SubtitleTrack> {
        let video = self
            .acquirer
            .ensure_video(series_id, page_number, aid, cid, credential, part.part_id)
            .await?;

        // The acquirer already brackets its own failures; anything failing
        // after a successful materialization must not leave the part stuck.
        match self.synthesize_from_video(&video).await {
            Ok(track) => Ok(track),
            Err(e) => {
                if let Err(reset_err) = self.catalog.reset_part(part.part_id).await {
                    warn!("Failed to reset part status: {}", reset_err);
                }
                Err(e)
            }
        }
    }

    async fn synthesize_from_video(&self, video: &Path) -> Result<SubtitleTrack> {
        let audio = media::extract_audio(video).await?;
        let pcm = media::decode_pcm(&audio).await?;

        let intervals = self.segmenter.segment(&pcm);
        if intervals.is_empty() {
            return Err(TekstError::SubtitleUnavailable(
                "no speech detected in audio".into(),
            ));
        }
        info!("Transcribing {} speech interval(s)", intervals.len());

        let segments = self.transcribe_all(&pcm, intervals).await?;
        Ok(subtitle::assemble(segments))
    }

    /// Transcribe every interval with bounded concurrency.
    ///
    /// `buffered` yields results in input order, so cue order follows interval
    /// start order regardless of which recognition call finishes first.
    async fn transcribe_all(
        &self,
        pcm: &PcmAudio,
        intervals: Vec<AudioInterval>,
    ) -> Result<Vec<(AudioInterval, String)>> {
        let results: Vec<(AudioInterval, Result<String>)> = stream::iter(intervals)
            .map(|interval| async move {
                (
                    interval,
                    self.transcriber.transcribe_interval(pcm, interval).await,
                )
            })
            .buffered(self.max_concurrent_intervals)
            .collect()
            .await;

        let mut segments = Vec::new();
        for (interval, result) in results {
            match result {
                Ok(text) if !text.is_empty() => segments.push((interval, text)),
                Ok(_) => {
                    warn!(
                        "Interval {}..{}ms produced empty text, skipping",
                        interval.start_ms, interval.end_ms
                    );
                }
                Err(e) => {
                    // Skip-and-log: a failed interval never fabricates a cue.
                    warn!(
                        "Interval {}..{}ms failed transcription: {}",
                        interval.start_ms, interval.end_ms, e
                    );
                }
            }
        }

        if segments.is_empty() {
            return Err(TekstError::SubtitleUnavailable(
                "no interval produced usable text".into(),
            ));
        }
        Ok(segments)
    }

    /// Persist the resolved track set and return it.
    async fn persist(&self, part: &Part, tracks: Vec<SubtitleTrack>) -> Result<Vec<SubtitleTrack>> {
        let json = serde_json::to_string(&tracks)?;
        self.catalog.set_part_subtitle(part.part_id, &json).await?;
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlatformSettings, SegmentationSettings};
    use crate::platform::{DownloadSource, ResolvedDownload};
    use crate::recognition::SpeechRecognizer;
    use crate::store::{MemoryCatalog, PartStatus};
    use crate::subtitle::Cue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockMetadata {
        calls: AtomicUsize,
        pages: u32,
    }

    impl MockMetadata {
        fn new(pages: u32) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                pages,
            }
        }
    }

    #[async_trait]
    impl MetadataSource for MockMetadata {
        async fn fetch(&self, series_id: &str) -> Result<VideoView> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let pages: Vec<serde_json::Value> = (1..=self.pages)
                .map(|p| {
                    serde_json::json!({
                        "cid": 9000 + p,
                        "page": p,
                        "part": format!("Part {}", p),
                        "duration": 600
                    })
                })
                .collect();
            Ok(serde_json::from_value(serde_json::json!({
                "bvid": series_id,
                "aid": 800123,
                "cid": 9001,
                "title": "Lecture",
                "desc": "d",
                "pic": "p",
                "owner": { "name": "o", "face": "f" },
                "pages": pages
            }))
            .unwrap())
        }
    }

    struct MockCaptions {
        calls: AtomicUsize,
        tracks: Option<Vec<SubtitleTrack>>,
    }

    impl MockCaptions {
        fn with_tracks(tracks: Option<Vec<SubtitleTrack>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                tracks,
            }
        }
    }

    #[async_trait]
    impl CaptionSource for MockCaptions {
        async fn fetch(&self, _: u64, _: u64, _: &str) -> Result<Option<Vec<SubtitleTrack>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tracks.clone())
        }
    }

    struct CountingRecognizer(AtomicUsize);

    #[async_trait]
    impl SpeechRecognizer for CountingRecognizer {
        async fn recognize(&self, _: Vec<u8>, _: &str) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("text".to_string())
        }
    }

    struct FailingDownloads;

    #[async_trait]
    impl DownloadSource for FailingDownloads {
        async fn resolve(&self, _: u64, _: u64, _: &str) -> Result<ResolvedDownload> {
            Err(TekstError::UpstreamUnavailable("cdn down".into()))
        }
    }

    fn native_track() -> SubtitleTrack {
        SubtitleTrack {
            language_label: "中文（自动生成）".to_string(),
            cues: vec![Cue {
                start_seconds: 0.0,
                end_seconds: 1.2,
                display_position: 2,
                text: "hi".to_string(),
            }],
        }
    }

    struct Harness {
        resolver: SubtitleResolver,
        catalog: Arc<MemoryCatalog>,
        metadata: Arc<MockMetadata>,
        captions: Arc<MockCaptions>,
        recognizer_calls: Arc<CountingRecognizer>,
        _media_dir: tempfile::TempDir,
    }

    fn harness(pages: u32, native: Option<Vec<SubtitleTrack>>) -> Harness {
        let catalog = Arc::new(MemoryCatalog::new());
        let metadata = Arc::new(MockMetadata::new(pages));
        let captions = Arc::new(MockCaptions::with_tracks(native));
        let recognizer = Arc::new(CountingRecognizer(AtomicUsize::new(0)));
        let media_dir = tempfile::tempdir().unwrap();

        let acquirer = VideoAcquirer::with_config(
            &PlatformSettings::default(),
            media_dir.path().to_path_buf(),
            Arc::new(FailingDownloads),
            catalog.clone() as Arc<dyn Catalog>,
        )
        .unwrap();

        let resolver = SubtitleResolver::with_components(
            catalog.clone(),
            metadata.clone(),
            captions.clone(),
            acquirer,
            EnergyVad::with_config(&SegmentationSettings::default()),
            Transcriber::new(recognizer.clone()),
            2,
        );

        Harness {
            resolver,
            catalog,
            metadata,
            captions,
            recognizer_calls: recognizer,
            _media_dir: media_dir,
        }
    }

    #[tokio::test]
    async fn test_native_captions_win_and_recognition_never_runs() {
        let h = harness(3, Some(vec![native_track()]));

        let tracks = h.resolver.resolve("BV1wy4y1D7JT", 3, "cookie").await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].language_label, "中文（自动生成）");
        assert_eq!(h.recognizer_calls.0.load(Ordering::SeqCst), 0);

        // Persisted on the part.
        let series = h
            .catalog
            .get_series_by_unique_id("BV1wy4y1D7JT")
            .await
            .unwrap()
            .unwrap();
        let part = h.catalog.get_part(series.series_id, 3).await.unwrap().unwrap();
        assert!(part.subtitle.is_some());
    }

    #[tokio::test]
    async fn test_second_resolution_is_cached_and_byte_identical() {
        let h = harness(1, Some(vec![native_track()]));

        let first = h.resolver.resolve("BV1PT4y1e7UU", 1, "c").await.unwrap();
        let second = h.resolver.resolve("BV1PT4y1e7UU", 1, "c").await.unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        // One metadata fetch, one caption fetch: the second call hit the cache.
        assert_eq!(h.metadata.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.captions.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_series_and_parts_created_on_first_sight() {
        let h = harness(3, Some(vec![native_track()]));
        h.resolver.resolve("BV1wy4y1D7JT", 2, "c").await.unwrap();

        let series = h
            .catalog
            .get_series_by_unique_id("BV1wy4y1D7JT")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(series.title, "Lecture");
        assert_eq!(series.source, "bilibili");

        for page in 1..=3 {
            let part = h
                .catalog
                .get_part(series.series_id, page)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(part.title, format!("Part {}", page));
        }
    }

    #[tokio::test]
    async fn test_unknown_page_is_not_found() {
        let h = harness(2, Some(vec![native_track()]));
        let result = h.resolver.resolve("BV1wy4y1D7JT", 9, "c").await;
        assert!(matches!(result, Err(TekstError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_no_captions_falls_through_to_acquisition() {
        let h = harness(1, None);

        let result = h.resolver.resolve("BV1wy4y1D7JT", 1, "c").await;
        // The mock download source fails, so the synthesis branch surfaces a
        // download failure; crucially the caption source was consulted first.
        assert!(matches!(result, Err(TekstError::Download(_))));
        assert_eq!(h.captions.calls.load(Ordering::SeqCst), 1);

        // Failed acquisition leaves the part NotStarted and unpersisted.
        let series = h
            .catalog
            .get_series_by_unique_id("BV1wy4y1D7JT")
            .await
            .unwrap()
            .unwrap();
        let part = h.catalog.get_part(series.series_id, 1).await.unwrap().unwrap();
        assert_eq!(part.status, PartStatus::NotStarted);
        assert!(part.subtitle.is_none());
    }

    #[tokio::test]
    async fn test_empty_caption_result_treated_as_none() {
        let h = harness(1, Some(vec![]));
        let result = h.resolver.resolve("BV1wy4y1D7JT", 1, "c").await;
        // Empty track list must not be persisted as a successful result.
        assert!(result.is_err());
        let series = h
            .catalog
            .get_series_by_unique_id("BV1wy4y1D7JT")
            .await
            .unwrap()
            .unwrap();
        let part = h.catalog.get_part(series.series_id, 1).await.unwrap().unwrap();
        assert!(part.subtitle.is_none());
    }
}
