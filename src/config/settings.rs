//! Configuration settings for Tekst.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub platform: PlatformSettings,
    pub captions: CaptionSettings,
    pub segmentation: SegmentationSettings,
    pub recognition: RecognitionSettings,
    pub catalog: CatalogSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for downloaded video and extracted audio artifacts.
    pub media_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tekst".to_string(),
            media_dir: "~/.tekst/media".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Remote platform endpoints and request headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// Base URL of the platform API.
    pub api_base: String,
    /// Endpoint that resolves short-lived download URLs.
    pub download_resolver: String,
    /// User-Agent sent with every platform request.
    pub user_agent: String,
    /// Referer header required by the platform CDN.
    pub referer: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.bilibili.com".to_string(),
            download_resolver: "https://bili.zhouql.vip/download/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://www.bilibili.com/".to_string(),
        }
    }
}

/// Native caption retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    /// How many times to query the caption listing before giving up.
    pub max_retries: u32,
    /// Delay between listing attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Voice-activity-detection settings for the synthesis branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Longest single speech segment; longer regions are split.
    pub max_segment_duration_ms: u64,
    /// Silence that ends a speech region.
    pub max_trailing_silence_ms: u64,
    /// Analysis frame length.
    pub frame_ms: u64,
    /// RMS threshold (on i16 samples) above which a frame counts as speech.
    pub energy_threshold: f64,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            max_segment_duration_ms: 20_000,
            max_trailing_silence_ms: 250,
            frame_ms: 30,
            energy_threshold: 500.0,
        }
    }
}

/// Speech recognition service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// ASR service endpoint accepting a WAV upload.
    pub asr_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_seconds: u64,
    /// Maximum intervals recognized concurrently.
    pub max_concurrent_intervals: usize,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            asr_url: "http://127.0.0.1:9977/asr".to_string(),
            request_timeout_seconds: 600,
            max_concurrent_intervals: 2,
        }
    }
}

/// Catalog (persistence) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Path to the SQLite catalog database.
    pub sqlite_path: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.tekst/catalog.db".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TekstError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tekst")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded media artifact directory path.
    pub fn media_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.media_dir)
    }

    /// Get the expanded SQLite catalog path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.catalog.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.captions.max_retries, 3);
        assert_eq!(parsed.captions.retry_delay_ms, 1000);
        assert_eq!(parsed.segmentation.max_segment_duration_ms, 20_000);
        assert_eq!(parsed.segmentation.max_trailing_silence_ms, 250);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let partial = r#"
            [captions]
            max_retries = 5
        "#;
        let settings: Settings = toml::from_str(partial).unwrap();
        assert_eq!(settings.captions.max_retries, 5);
        assert_eq!(settings.captions.retry_delay_ms, 1000);
        assert_eq!(settings.general.log_level, "info");
    }

    #[test]
    fn test_expand_path() {
        let p = Settings::expand_path("/tmp/tekst");
        assert_eq!(p, PathBuf::from("/tmp/tekst"));
    }
}
