//! Subtitle track model and projections.
//!
//! Cue and track field names follow the platform caption wire format
//! (`from`/`to`/`location`/`content`, `lan`/`subtitle`), so native caption
//! bodies deserialize directly and machine-generated tracks serialize into the
//! same shape the catalog stores.

use crate::media::pcm::AudioInterval;
use serde::{Deserialize, Serialize};

/// Language label used for tracks synthesized by the recognition pipeline.
pub const MACHINE_GENERATED_LABEL: &str = "machine-generated";

/// Display position used for every generated cue (bottom of the frame).
pub const GENERATED_DISPLAY_POSITION: u8 = 2;

/// A single timed text entry within a subtitle track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds.
    #[serde(rename = "from")]
    pub start_seconds: f64,
    /// End time in seconds.
    #[serde(rename = "to")]
    pub end_seconds: f64,
    /// Display position hint.
    #[serde(rename = "location", default = "default_position")]
    pub display_position: u8,
    /// Sanitized cue text.
    #[serde(rename = "content")]
    pub text: String,
}

fn default_position() -> u8 {
    GENERATED_DISPLAY_POSITION
}

/// One subtitle track: a language label and its ordered cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Language tag, or [`MACHINE_GENERATED_LABEL`] for synthesized tracks.
    #[serde(rename = "lan")]
    pub language_label: String,
    /// Cues in non-decreasing start order.
    #[serde(rename = "subtitle")]
    pub cues: Vec<Cue>,
}

impl SubtitleTrack {
    /// Whether cue starts are non-decreasing.
    pub fn is_ordered(&self) -> bool {
        self.cues
            .windows(2)
            .all(|w| w[0].start_seconds <= w[1].start_seconds)
    }
}

/// Stitch per-interval transcriptions into a single machine-generated track.
///
/// Intervals are millisecond-based; cue times are the plain `/ 1000.0`
/// conversion with no extra rounding. Input order is preserved.
pub fn assemble(segments: Vec<(AudioInterval, String)>) -> SubtitleTrack {
    let cues = segments
        .into_iter()
        .map(|(interval, text)| Cue {
            start_seconds: interval.start_ms as f64 / 1000.0,
            end_seconds: interval.end_ms as f64 / 1000.0,
            display_position: GENERATED_DISPLAY_POSITION,
            text,
        })
        .collect();

    SubtitleTrack {
        language_label: MACHINE_GENERATED_LABEL.to_string(),
        cues,
    }
}

/// Render a track as compacted plain text.
///
/// Consecutive cues are merged with single spaces while the running buffer is
/// shorter than `min_chars`; a line is emitted each time the buffer reaches the
/// threshold or the track ends. With `min_chars = 0` every cue becomes its own
/// line. When `include_timestamps` is set, each line is prefixed with the start
/// time of its first cue, formatted to two decimal places.
pub fn compact_text(track: &SubtitleTrack, min_chars: usize, include_timestamps: bool) -> String {
    if track.cues.is_empty() {
        return String::new();
    }

    let render = |start: f64, text: &str| {
        if include_timestamps {
            format!("[{:.2}] {}", start, text)
        } else {
            text.to_string()
        }
    };

    if min_chars == 0 {
        return track
            .cues
            .iter()
            .map(|cue| render(cue.start_seconds, cue.text.trim()))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let mut lines = Vec::new();
    let mut buffer = String::new();
    let mut buffer_start = 0.0;

    for cue in &track.cues {
        let text = cue.text.trim();
        if buffer.is_empty() {
            buffer = text.to_string();
            buffer_start = cue.start_seconds;
            continue;
        }
        if buffer.chars().count() < min_chars {
            buffer.push(' ');
            buffer.push_str(text);
        } else {
            lines.push(render(buffer_start, &buffer));
            buffer = text.to_string();
            buffer_start = cue.start_seconds;
        }
    }

    if !buffer.is_empty() {
        lines.push(render(buffer_start, &buffer));
    }

    lines.join("\n")
}
