//! Tekst - Subtitle Resolution Pipeline
//!
//! A CLI tool and library for resolving subtitles for platform videos.
//!
//! The name "Tekst" comes from the Norwegian/Scandinavian word for "text."
//!
//! # Overview
//!
//! Tekst resolves the subtitle track set for a video through a layered
//! fallback chain:
//! - A previously resolved result is served from the local catalog
//! - Platform-native captions are fetched with retry when available
//! - Otherwise the video is downloaded, its audio extracted and segmented,
//!   and each speech interval transcribed into a machine-generated track
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `platform` - Platform API clients (metadata, captions, downloads)
//! - `store` - Catalog persistence (series, parts, resolved subtitles)
//! - `subtitle` - Track model, assembly, and plain-text projection
//! - `media` - Artifact paths, video acquisition, audio extraction
//! - `recognition` - Speech segmentation, sanitization, ASR client
//! - `retry` - Fixed-delay retry policy
//! - `resolver` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tekst::config::Settings;
//! use tekst::resolver::SubtitleResolver;
//! use tekst::store::{Catalog, SqliteCatalog};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);
//!     let resolver = SubtitleResolver::new(&settings, catalog)?;
//!
//!     let tracks = resolver.resolve_url("BV1wy4y1D7JT?p=3", "").await?;
//!     println!("Resolved {} track(s)", tracks.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod platform;
pub mod recognition;
pub mod resolver;
pub mod retry;
pub mod store;
pub mod subtitle;

pub use error::{Result, TekstError};
