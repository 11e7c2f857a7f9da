//! Voice-activity detection over decoded PCM.

use crate::config::SegmentationSettings;
use crate::media::pcm::{AudioInterval, PcmAudio};
use tracing::debug;

/// Frame-energy voice-activity detector.
///
/// Splits an audio stream into ordered, non-overlapping speech intervals.
/// Silence between and around speech is dropped, never emitted. A region ends
/// once trailing silence exceeds `max_trailing_silence_ms`; regions longer
/// than `max_segment_duration_ms` are split at the cap. This is a pure
/// detection pass; no recognition model is involved.
pub struct EnergyVad {
    max_segment_duration_ms: u64,
    max_trailing_silence_ms: u64,
    frame_ms: u64,
    energy_threshold: f64,
}

impl EnergyVad {
    pub fn with_config(settings: &SegmentationSettings) -> Self {
        Self {
            max_segment_duration_ms: settings.max_segment_duration_ms.max(1),
            max_trailing_silence_ms: settings.max_trailing_silence_ms,
            frame_ms: settings.frame_ms.max(1),
            energy_threshold: settings.energy_threshold,
        }
    }

    /// Detect speech intervals in `audio`.
    pub fn segment(&self, audio: &PcmAudio) -> Vec<AudioInterval> {
        let frame_len = (audio.sample_rate as u64 * self.frame_ms / 1000).max(1) as usize;

        let mut intervals = Vec::new();
        let mut region_start: Option<u64> = None;
        let mut last_speech_end = 0u64;

        for (i, frame) in audio.samples.chunks(frame_len).enumerate() {
            let frame_start = frame_offset_ms(audio.sample_rate, i * frame_len);
            let frame_end = frame_offset_ms(audio.sample_rate, i * frame_len + frame.len());

            if rms(frame) >= self.energy_threshold {
                if region_start.is_none() {
                    region_start = Some(frame_start);
                }
                last_speech_end = frame_end;

                // Over-long regions are split at the cap.
                if let Some(start) = region_start {
                    if last_speech_end - start >= self.max_segment_duration_ms {
                        intervals.push(AudioInterval::new(start, last_speech_end));
                        region_start = None;
                    }
                }
            } else if let Some(start) = region_start {
                if frame_end.saturating_sub(last_speech_end) > self.max_trailing_silence_ms {
                    intervals.push(AudioInterval::new(start, last_speech_end));
                    region_start = None;
                }
            }
        }

        if let Some(start) = region_start {
            if last_speech_end > start {
                intervals.push(AudioInterval::new(start, last_speech_end));
            }
        }

        debug!("Detected {} speech interval(s)", intervals.len());
        intervals
    }
}

fn frame_offset_ms(sample_rate: u32, sample_index: usize) -> u64 {
    (sample_index as u64 * 1000) / sample_rate as u64
}

fn rms(frame: &[i16]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / frame.len() as f64).sqrt()
}
