//! Local media pipeline: artifact naming, video acquisition, audio extraction.

pub mod acquire;
pub mod extract;
pub mod paths;
pub mod pcm;

pub use acquire::VideoAcquirer;
pub use extract::{decode_pcm, extract_audio};
pub use paths::{artifact_stem, audio_path, video_path};
pub use pcm::{AudioInterval, PcmAudio};
