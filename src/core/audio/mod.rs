//! Audio formats, WAV packaging and compressed transcoding.

mod error;
mod format;
mod transcode;
mod wav;

pub use error::{AudioError, AudioResult};
pub use format::{
    AudioFragment, DEFAULT_BITS_PER_SAMPLE, DEFAULT_CHANNEL_COUNT, DEFAULT_SAMPLE_RATE_HZ,
    SampleFormat,
};
pub use transcode::{
    DEFAULT_BITRATE_KBPS, SUPPORTED_BITRATES_KBPS, TargetCodec, TranscodeSource, Transcoder,
};
pub use wav::{WAV_HEADER_LEN, build_wav};
