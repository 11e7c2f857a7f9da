//! Deterministic artifact paths.
//!
//! Video and audio artifacts double as a cache keyed by (series, page); the
//! naming scheme must stay stable or the idempotency checks stop finding
//! previously downloaded files.

use std::path::{Path, PathBuf};

/// Base file stem for a part: plain series ID for page 1, `_p<N>` suffix
/// otherwise.
pub fn artifact_stem(series_id: &str, page_number: u32) -> String {
    if page_number > 1 {
        format!("{}_p{}", series_id, page_number)
    } else {
        series_id.to_string()
    }
}

/// Path of the raw video artifact for a part.
pub fn video_path(media_root: &Path, series_id: &str, page_number: u32) -> PathBuf {
    media_root.join(format!("{}.mp4", artifact_stem(series_id, page_number)))
}

/// Path of the extracted audio artifact, derived from the video's base name.
pub fn audio_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    video.with_file_name(format!("{}_audio.mp3", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_page_one_is_plain() {
        assert_eq!(artifact_stem("BV1wy4y1D7JT", 1), "BV1wy4y1D7JT");
    }

    #[test]
    fn test_stem_later_pages_suffixed() {
        assert_eq!(artifact_stem("BV1wy4y1D7JT", 3), "BV1wy4y1D7JT_p3");
    }

    #[test]
    fn test_video_path() {
        let path = video_path(Path::new("/media"), "BV1wy4y1D7JT", 3);
        assert_eq!(path, PathBuf::from("/media/BV1wy4y1D7JT_p3.mp4"));
    }

    #[test]
    fn test_audio_path_from_video() {
        let audio = audio_path(Path::new("/media/BV1wy4y1D7JT_p3.mp4"));
        assert_eq!(audio, PathBuf::from("/media/BV1wy4y1D7JT_p3_audio.mp3"));

        let audio = audio_path(Path::new("/media/BV1wy4y1D7JT.mp4"));
        assert_eq!(audio, PathBuf::from("/media/BV1wy4y1D7JT_audio.mp3"));
    }
}
