//! Error types for Tekst.

use thiserror::Error;

/// Library-level error type for Tekst operations.
#[derive(Error, Debug)]
pub enum TekstError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Platform unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Unexpected platform response shape: {0}")]
    UpstreamSchema(String),

    #[error("Platform error {code}: {message}")]
    UpstreamLogical { code: i64, message: String },

    #[error("Video download failed: {0}")]
    Download(String),

    #[error("Media decode failed: {0}")]
    MediaDecode(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("No subtitle could be produced: {0}")]
    SubtitleUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),
}

/// Result type alias for Tekst operations.
pub type Result<T> = std::result::Result<T, TekstError>;
