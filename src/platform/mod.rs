//! Remote platform client.
//!
//! Typed wrappers around the platform's metadata, caption, and
//! download-resolution endpoints. Every response is validated into an explicit
//! schema at the boundary; shape mismatches and non-zero application codes
//! surface as typed errors instead of leaking raw JSON into the pipeline.

mod captions;
mod download;
mod metadata;
mod url;

pub use captions::{
    BilibiliCaptions, CaptionEntry, CaptionSource, CaptionTransport, HttpCaptionTransport,
};
pub use download::{BilibiliDownloads, DownloadSource, ResolvedDownload};
pub use metadata::{BilibiliMetadata, MetadataSource, OwnerInfo, PageInfo, VideoView};
pub use url::extract_series_and_page;
