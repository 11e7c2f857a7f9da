//! In-memory PCM audio and interval slicing.

use crate::error::{Result, TekstError};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// A half-open speech interval in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInterval {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl AudioInterval {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Decoded mono PCM audio, loaded once and sliced per interval in memory.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl PcmAudio {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Total duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    fn sample_index(&self, ms: u64) -> usize {
        let idx = (ms as u128 * self.sample_rate as u128 / 1000) as usize;
        idx.min(self.samples.len())
    }

    /// Samples covering an interval, clamped to the audio bounds.
    pub fn slice(&self, interval: AudioInterval) -> &[i16] {
        let start = self.sample_index(interval.start_ms);
        let end = self.sample_index(interval.end_ms);
        &self.samples[start..end.max(start)]
    }

    /// Encode one interval as a standalone WAV file in memory.
    pub fn wav_bytes(&self, interval: AudioInterval) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| TekstError::MediaDecode(format!("WAV encode: {}", e)))?;
            for &sample in self.slice(interval) {
                writer
                    .write_sample(sample)
                    .map_err(|e| TekstError::MediaDecode(format!("WAV encode: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| TekstError::MediaDecode(format!("WAV encode: {}", e)))?;
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_of_ms(sample_rate: u32, ms: u64) -> PcmAudio {
        let n = (ms as usize * sample_rate as usize) / 1000;
        PcmAudio::new(sample_rate, vec![0i16; n])
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(audio_of_ms(16_000, 10_000).duration_ms(), 10_000);
    }

    #[test]
    fn test_slice_bounds() {
        let audio = audio_of_ms(1000, 100); // 1 sample per ms
        assert_eq!(audio.slice(AudioInterval::new(10, 20)).len(), 10);
        // Clamped past the end
        assert_eq!(audio.slice(AudioInterval::new(90, 200)).len(), 10);
        // Degenerate interval
        assert_eq!(audio.slice(AudioInterval::new(50, 50)).len(), 0);
    }

    #[test]
    fn test_wav_bytes_round_trip() {
        let mut audio = audio_of_ms(16_000, 100);
        for (i, s) in audio.samples.iter_mut().enumerate() {
            *s = (i % 100) as i16;
        }

        let bytes = audio.wav_bytes(AudioInterval::new(0, 50)).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 800); // 50ms at 16kHz
    }
}
