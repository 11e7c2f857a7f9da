//! HTTP-backed speech recognition.

use super::SpeechRecognizer;
use crate::config::RecognitionSettings;
use crate::error::{Result, TekstError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct AsrResponse {
    text: String,
}

/// Recognizer backed by a long-lived external ASR service.
///
/// The service owns the model lifecycle; this client just uploads one WAV
/// slice per call and receives the raw transcript (inverse text normalization
/// and punctuation restoration happen service-side). Construct once and share;
/// the underlying connection pool is reused across calls.
pub struct HttpRecognizer {
    client: reqwest::Client,
    url: String,
}

impl HttpRecognizer {
    pub fn with_config(settings: &RecognitionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: settings.asr_url.clone(),
        })
    }
}

#[async_trait]
impl SpeechRecognizer for HttpRecognizer {
    #[instrument(skip(self, wav), fields(bytes = wav.len(), file = %file_name))]
    async fn recognize(&self, wav: Vec<u8>, file_name: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")
            .map_err(|e| TekstError::Transcription(format!("invalid upload: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TekstError::Transcription(format!("ASR request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(TekstError::Transcription(format!(
                "ASR service returned {}",
                response.status()
            )));
        }

        let body: AsrResponse = response
            .json()
            .await
            .map_err(|e| TekstError::Transcription(format!("ASR response body: {}", e)))?;

        Ok(body.text)
    }
}
