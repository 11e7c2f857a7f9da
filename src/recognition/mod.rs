//! Speech segmentation and transcription.
//!
//! The synthesis branch decodes audio once into PCM, detects speech intervals
//! locally (no model), then recognizes each interval through a shared,
//! long-lived ASR service and sanitizes the result into cue text.

mod asr;
mod sanitize;
mod segmenter;

pub use asr::HttpRecognizer;
pub use sanitize::sanitize;
pub use segmenter::EnergyVad;

use crate::error::Result;
use crate::media::pcm::{AudioInterval, PcmAudio};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for raw speech recognition backends.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize one WAV-encoded audio slice into a raw transcript string.
    async fn recognize(&self, wav: Vec<u8>, file_name: &str) -> Result<String>;
}

/// Turns one audio interval into sanitized cue text.
pub struct Transcriber {
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl Transcriber {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Transcribe one interval of already-decoded audio.
    ///
    /// The interval is sliced from the in-memory PCM (no re-read of the source
    /// file), recognized, then filtered through the character allow-list and
    /// trimmed.
    pub async fn transcribe_interval(
        &self,
        audio: &PcmAudio,
        interval: AudioInterval,
    ) -> Result<String> {
        let wav = audio.wav_bytes(interval)?;
        let file_name = format!("{}-{}.wav", interval.start_ms, interval.end_ms);

        let raw = self.recognizer.recognize(wav, &file_name).await?;
        Ok(sanitize(&raw).trim().to_string())
    }
}
