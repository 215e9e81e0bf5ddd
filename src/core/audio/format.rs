//! Sample format descriptors and the audio fragment type delivered by upstream streams.
//!
//! Upstream services declare the format of each fragment through a MIME-like tag
//! such as `audio/L16;codec=pcm;rate=24000`. Parsing is deliberately lenient:
//! a missing or malformed field falls back to its documented default while the
//! well-formed fields are kept.

use bytes::Bytes;

/// Default sample rate of the upstream streaming format.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 24_000;

/// Default bit depth of the upstream streaming format.
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// Default channel count of the upstream streaming format.
pub const DEFAULT_CHANNEL_COUNT: u16 = 1;

/// Highest channel count accepted from a format tag.
pub const MAX_CHANNEL_COUNT: u16 = 8;

/// Highest sample rate accepted from a format tag.
pub const MAX_SAMPLE_RATE_HZ: u32 = 384_000;

/// Layout of interleaved linear PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub sample_rate_hz: u32,
    pub bits_per_sample: u16,
    pub channel_count: u16,
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            channel_count: DEFAULT_CHANNEL_COUNT,
        }
    }
}

impl SampleFormat {
    pub fn new(sample_rate_hz: u32, bits_per_sample: u16, channel_count: u16) -> Self {
        Self {
            sample_rate_hz,
            bits_per_sample,
            channel_count,
        }
    }

    /// Bytes occupied by a single sample of one channel.
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Bytes per frame (one sample for every channel), or `None` on overflow.
    pub fn block_align(&self) -> Option<u16> {
        self.channel_count.checked_mul(self.bytes_per_sample())
    }

    /// Bytes per second of audio, or `None` on overflow.
    pub fn byte_rate(&self) -> Option<u32> {
        self.block_align()
            .and_then(|align| self.sample_rate_hz.checked_mul(u32::from(align)))
    }

    /// Parses a MIME-like format tag.
    ///
    /// Recognised parameters:
    /// - `audio/L<bits>` sets the bit depth (e.g. `audio/L16`)
    /// - `rate=<hz>` sets the sample rate (case insensitive key), up to [`MAX_SAMPLE_RATE_HZ`]
    /// - `channels=<n>` sets the channel count, up to [`MAX_CHANNEL_COUNT`]
    ///
    /// Anything else, including unparsable or out-of-range values, is ignored and the
    /// default is used.
    ///
    /// # Example
    /// ```rust
    /// use narrator::core::audio::SampleFormat;
    ///
    /// let format = SampleFormat::from_mime_type("audio/L16;codec=pcm;rate=8000");
    /// assert_eq!(format.sample_rate_hz, 8000);
    /// assert_eq!(format.bits_per_sample, 16);
    /// assert_eq!(format.channel_count, 1);
    /// ```
    pub fn from_mime_type(mime_type: &str) -> Self {
        let mut format = Self::default();

        for param in mime_type.split(';').map(str::trim) {
            let lower = param.to_ascii_lowercase();

            if let Some(value) = lower.strip_prefix("rate=") {
                if let Some(rate) = value.trim().parse::<u32>()
                    .ok()
                    .filter(|r| (1..=MAX_SAMPLE_RATE_HZ).contains(r))
                {
                    format.sample_rate_hz = rate;
                }
            } else if let Some(value) = lower.strip_prefix("channels=") {
                if let Some(channels) = value.trim().parse::<u16>()
                    .ok()
                    .filter(|c| (1..=MAX_CHANNEL_COUNT).contains(c))
                {
                    format.channel_count = channels;
                }
            } else if let Some(value) = lower.strip_prefix("audio/l")
                && let Some(bits) = value
                    .parse::<u16>()
                    .ok()
                    .filter(|b| *b > 0 && b % 8 == 0)
            {
                format.bits_per_sample = bits;
            }
        }

        format
    }
}

/// One incremental chunk of raw audio delivered by an upstream stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFragment {
    /// Raw PCM bytes, in arrival order.
    pub data: Bytes,
    /// Format declared by the upstream for this chunk, if any.
    pub format: Option<SampleFormat>,
}

impl AudioFragment {
    pub fn new(data: impl Into<Bytes>, format: Option<SampleFormat>) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    /// Builds a fragment whose format is declared through a MIME-like tag.
    pub fn with_mime_type(data: impl Into<Bytes>, mime_type: &str) -> Self {
        Self::new(data, Some(SampleFormat::from_mime_type(mime_type)))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
