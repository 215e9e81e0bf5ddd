//! Conversion of uncompressed audio into a compressed delivery format.
//!
//! Two source shapes are accepted: a complete WAV container (decoded with `hound`)
//! or raw interleaved PCM accompanied by an explicit [`SampleFormat`]. Both are
//! normalised to 16-bit samples, downmixed to the target channel count and
//! encoded with LAME.

use std::io::Cursor;

use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality};
use tracing::debug;

use super::error::{AudioError, AudioResult};
use super::format::SampleFormat;

/// Default bitrate of the compressed output.
pub const DEFAULT_BITRATE_KBPS: u32 = 64;

/// Bitrates LAME accepts in constant-bitrate mode.
pub const SUPPORTED_BITRATES_KBPS: [u32; 16] = [
    8, 16, 24, 32, 40, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

/// Compressed target codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetCodec {
    #[default]
    Mp3,
}

impl TargetCodec {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Audio handed to the transcoder.
#[derive(Debug, Clone, Copy)]
pub enum TranscodeSource<'a> {
    /// A complete WAV container; the format is read from its header.
    Container(&'a [u8]),
    /// Raw interleaved little-endian PCM with its declared format.
    RawPcm {
        data: &'a [u8],
        format: SampleFormat,
    },
}

/// Fixed transcoding settings, owned by configuration rather than negotiated per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    pub codec: TargetCodec,
    pub bitrate_kbps: u32,
    pub channel_count: u16,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            codec: TargetCodec::Mp3,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            channel_count: 1,
        }
    }
}

/// Decoded samples normalised to 16 bits, still interleaved.
struct DecodedPcm {
    samples: Vec<i16>,
    sample_rate_hz: u32,
    channel_count: u16,
}

impl Transcoder {
    pub fn new(codec: TargetCodec, bitrate_kbps: u32, channel_count: u16) -> Self {
        Self {
            codec,
            bitrate_kbps,
            channel_count,
        }
    }

    /// Decodes `source`, downmixes it and encodes it with the configured codec.
    ///
    /// # Errors
    /// Returns `AudioError::Transcode` when the source cannot be decoded as the
    /// declared format (truncated container, misaligned payload, unsupported
    /// sample width) or when the encoder rejects the settings.
    pub fn transcode(&self, source: TranscodeSource<'_>) -> AudioResult<Vec<u8>> {
        let decoded = match source {
            TranscodeSource::Container(bytes) => decode_container(bytes)?,
            TranscodeSource::RawPcm { data, format } => decode_raw(data, &format)?,
        };

        let mixed = remix(&decoded.samples, decoded.channel_count, self.channel_count)?;

        let encoded = match self.codec {
            TargetCodec::Mp3 => encode_mp3(
                &mixed,
                decoded.sample_rate_hz,
                self.channel_count,
                self.bitrate_kbps,
            )?,
        };

        debug!(
            input_samples = decoded.samples.len(),
            output_bytes = encoded.len(),
            bitrate_kbps = self.bitrate_kbps,
            "Transcoded audio"
        );

        Ok(encoded)
    }

    pub fn content_type(&self) -> &'static str {
        self.codec.content_type()
    }
}

fn decode_container(bytes: &[u8]) -> AudioResult<DecodedPcm> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AudioError::Transcode(format!("invalid WAV container: {e}")))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| scale_to_i16(v, bits)))
                .collect::<Result<Vec<_>, _>>()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<Result<Vec<_>, _>>(),
    }
    .map_err(|e| AudioError::Transcode(format!("failed to read WAV samples: {e}")))?;

    Ok(DecodedPcm {
        samples,
        sample_rate_hz: spec.sample_rate,
        channel_count: spec.channels,
    })
}

fn decode_raw(data: &[u8], format: &SampleFormat) -> AudioResult<DecodedPcm> {
    if format.channel_count == 0 || format.sample_rate_hz == 0 {
        return Err(AudioError::Transcode(format!(
            "invalid declared format: {format:?}"
        )));
    }

    let width = usize::from(format.bytes_per_sample());
    if !matches!(format.bits_per_sample, 8 | 16 | 24 | 32) {
        return Err(AudioError::Transcode(format!(
            "unsupported PCM bit depth: {}",
            format.bits_per_sample
        )));
    }

    let block_align = format
        .block_align()
        .map(usize::from)
        .ok_or_else(|| AudioError::Transcode(format!("frame size overflows for {format:?}")))?;
    if data.len() % block_align != 0 {
        return Err(AudioError::Transcode(format!(
            "payload of {} bytes is not a whole number of {block_align}-byte frames",
            data.len()
        )));
    }

    let samples = data
        .chunks_exact(width)
        .map(|chunk| match chunk {
            // 8-bit WAV PCM is unsigned
            [b] => (i16::from(*b) - 128) << 8,
            [lo, hi] => i16::from_le_bytes([*lo, *hi]),
            [b0, b1, b2] => (i32::from_le_bytes([0, *b0, *b1, *b2]) >> 16) as i16,
            [b0, b1, b2, b3] => (i32::from_le_bytes([*b0, *b1, *b2, *b3]) >> 16) as i16,
            _ => 0,
        })
        .collect();

    Ok(DecodedPcm {
        samples,
        sample_rate_hz: format.sample_rate_hz,
        channel_count: format.channel_count,
    })
}

/// Rescales a signed integer sample of `bits` width to 16 bits.
fn scale_to_i16(sample: i32, bits: u16) -> i16 {
    match bits {
        0..=16 => (sample << (16 - bits)) as i16,
        _ => (sample >> (bits - 16)) as i16,
    }
}

/// Converts interleaved samples from `from` channels to `to` channels.
fn remix(samples: &[i16], from: u16, to: u16) -> AudioResult<Vec<i16>> {
    let from = usize::from(from);
    match (from, to) {
        (_, 0) | (0, _) => Err(AudioError::Transcode(
            "channel count must be at least 1".to_string(),
        )),
        (f, t) if f == usize::from(t) => Ok(samples.to_vec()),
        (f, 1) => Ok(samples
            .chunks_exact(f)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
                (sum / f as i32) as i16
            })
            .collect()),
        (1, 2) => Ok(samples.iter().flat_map(|s| [*s, *s]).collect()),
        (f, 2) => Ok(samples
            .chunks_exact(f)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect()),
        (_, t) => Err(AudioError::Transcode(format!(
            "unsupported target channel count: {t}"
        ))),
    }
}

fn bitrate_from_kbps(kbps: u32) -> Option<Bitrate> {
    let bitrate = match kbps {
        8 => Bitrate::Kbps8,
        16 => Bitrate::Kbps16,
        24 => Bitrate::Kbps24,
        32 => Bitrate::Kbps32,
        40 => Bitrate::Kbps40,
        48 => Bitrate::Kbps48,
        64 => Bitrate::Kbps64,
        80 => Bitrate::Kbps80,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        224 => Bitrate::Kbps224,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        _ => return None,
    };
    Some(bitrate)
}

fn encode_mp3(
    samples: &[i16],
    sample_rate_hz: u32,
    channel_count: u16,
    bitrate_kbps: u32,
) -> AudioResult<Vec<u8>> {
    let encoder_error = |stage: &str, e: &dyn std::fmt::Debug| {
        AudioError::Transcode(format!("MP3 encoder {stage} failed: {e:?}"))
    };

    let bitrate = bitrate_from_kbps(bitrate_kbps).ok_or_else(|| {
        AudioError::Transcode(format!("unsupported MP3 bitrate: {bitrate_kbps} kbps"))
    })?;
    let channels = u8::try_from(channel_count)
        .ok()
        .filter(|c| matches!(c, 1 | 2))
        .ok_or_else(|| {
            AudioError::Transcode(format!("unsupported MP3 channel count: {channel_count}"))
        })?;

    let mut builder = Builder::new()
        .ok_or_else(|| AudioError::Transcode("failed to allocate LAME encoder".to_string()))?;
    builder
        .set_num_channels(channels)
        .map_err(|e| encoder_error("channel setup", &e))?;
    builder
        .set_sample_rate(sample_rate_hz)
        .map_err(|e| encoder_error("sample rate setup", &e))?;
    builder
        .set_brate(bitrate)
        .map_err(|e| encoder_error("bitrate setup", &e))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| encoder_error("quality setup", &e))?;
    let mut encoder = builder.build().map_err(|e| encoder_error("init", &e))?;

    let frames = samples.len() / usize::from(channel_count);
    let mut out = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(frames));

    if channels == 1 {
        encoder.encode_to_vec(MonoPcm(samples), &mut out)
    } else {
        let left: Vec<i16> = samples.iter().step_by(2).copied().collect();
        let right: Vec<i16> = samples.iter().skip(1).step_by(2).copied().collect();
        encoder.encode_to_vec(
            DualPcm {
                left: &left,
                right: &right,
            },
            &mut out,
        )
    }
    .map_err(|e| encoder_error("encode", &e))?;

    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(|e| encoder_error("flush", &e))?;

    Ok(out)
}
