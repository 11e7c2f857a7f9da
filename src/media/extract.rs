//! Audio extraction and decoding via ffmpeg.

use super::paths;
use super::pcm::PcmAudio;
use crate::error::{Result, TekstError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Demux the audio track of a video into a standalone MP3 next to it.
///
/// Writes exactly one audio file (`<base>_audio.mp3`) and leaves the source
/// video in place. Fails with `MediaDecode` when the container is unreadable
/// or has no audio stream.
#[instrument(skip_all, fields(video = %video.display()))]
pub async fn extract_audio(video: &Path) -> Result<PathBuf> {
    let output = paths::audio_path(video);

    if output.exists() {
        debug!("Using cached audio artifact");
        return Ok(output);
    }

    info!("Extracting audio track");

    let result = Command::new("ffmpeg")
        .arg("-i").arg(video)
        .arg("-vn")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(&output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(output),
        Ok(out) => {
            // A failed run can leave a zero-length output behind.
            let _ = std::fs::remove_file(&output);
            let err = String::from_utf8_lossy(&out.stderr);
            Err(TekstError::MediaDecode(format!(
                "ffmpeg could not extract audio: {}",
                err.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TekstError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(TekstError::MediaDecode(format!("ffmpeg error: {}", e))),
    }
}

/// Decode an audio file to 16 kHz mono PCM for segmentation and recognition.
#[instrument(skip_all, fields(audio = %audio.display()))]
pub async fn decode_pcm(audio: &Path) -> Result<PcmAudio> {
    let temp_dir = tempfile::tempdir()?;
    let wav_path = temp_dir.path().join("decoded.wav");

    let result = Command::new("ffmpeg")
        .arg("-i").arg(audio)
        .arg("-ac").arg("1")
        .arg("-ar").arg("16000")
        .arg("-f").arg("wav")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(&wav_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => {}
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            return Err(TekstError::MediaDecode(format!(
                "ffmpeg could not decode audio: {}",
                err.trim()
            )));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TekstError::ToolNotFound("ffmpeg".into()));
        }
        Err(e) => return Err(TekstError::MediaDecode(format!("ffmpeg error: {}", e))),
    }

    let reader = hound::WavReader::open(&wav_path)
        .map_err(|e| TekstError::MediaDecode(format!("WAV read: {}", e)))?;
    let sample_rate = reader.spec().sample_rate;

    let samples: std::result::Result<Vec<i16>, _> = reader.into_samples::<i16>().collect();
    let samples = samples.map_err(|e| TekstError::MediaDecode(format!("WAV read: {}", e)))?;

    debug!(
        "Decoded {} samples at {} Hz",
        samples.len(),
        sample_rate
    );

    Ok(PcmAudio::new(sample_rate, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_video_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let result = extract_audio(&missing).await;
        assert!(matches!(
            result,
            Err(TekstError::MediaDecode(_)) | Err(TekstError::ToolNotFound(_))
        ));
    }
}
