//! RIFF/WAVE container synthesis for raw PCM payloads.
//!
//! The header is the canonical 44-byte PCM layout. Every multi-byte integer is
//! little-endian and the payload follows the header unchanged.

use bytes::{BufMut, BytesMut};
use tracing::debug;

use super::error::{AudioError, AudioResult};
use super::format::SampleFormat;

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// RIFF chunk size excluding the payload ("WAVE" + fmt chunk + data chunk header).
const RIFF_OVERHEAD: u32 = 36;

/// Size of the `fmt ` sub-chunk body for uncompressed PCM.
const FMT_CHUNK_SIZE: u32 = 16;

/// `WAVE_FORMAT_PCM`.
const PCM_FORMAT_CODE: u16 = 1;

/// Wraps raw interleaved PCM bytes in a WAV container.
///
/// The function is total over payload lengths that fit the 32-bit size fields;
/// a zero-length payload produces a valid header-only container.
///
/// # Errors
/// Returns `AudioError::ContainerBuild` when the payload is too large for the
/// RIFF size fields, the declared format has no whole-byte sample width, or the
/// byte rate or block align does not fit its header field.
///
/// # Example
/// ```rust
/// use narrator::core::audio::{SampleFormat, build_wav};
///
/// let wav = build_wav(&[1, 2, 3, 4], &SampleFormat::new(8000, 16, 1)).unwrap();
/// assert_eq!(&wav[0..4], b"RIFF");
/// assert_eq!(&wav[44..], &[1, 2, 3, 4]);
/// ```
pub fn build_wav(pcm: &[u8], format: &SampleFormat) -> AudioResult<Vec<u8>> {
    if format.bits_per_sample == 0 || format.bits_per_sample % 8 != 0 {
        return Err(AudioError::ContainerBuild(format!(
            "unsupported bits per sample: {}",
            format.bits_per_sample
        )));
    }
    if format.channel_count == 0 {
        return Err(AudioError::ContainerBuild(
            "channel count must be at least 1".to_string(),
        ));
    }

    let (Some(block_align), Some(byte_rate)) = (format.block_align(), format.byte_rate()) else {
        return Err(AudioError::ContainerBuild(format!(
            "derived header fields overflow for {format:?}"
        )));
    };

    let data_size = u32::try_from(pcm.len())
        .ok()
        .filter(|len| *len <= u32::MAX - RIFF_OVERHEAD)
        .ok_or_else(|| {
            AudioError::ContainerBuild(format!(
                "payload of {} bytes exceeds the RIFF size limit",
                pcm.len()
            ))
        })?;

    let mut buf = BytesMut::with_capacity(WAV_HEADER_LEN + pcm.len());

    buf.put_slice(b"RIFF");
    buf.put_u32_le(RIFF_OVERHEAD + data_size);
    buf.put_slice(b"WAVE");

    buf.put_slice(b"fmt ");
    buf.put_u32_le(FMT_CHUNK_SIZE);
    buf.put_u16_le(PCM_FORMAT_CODE);
    buf.put_u16_le(format.channel_count);
    buf.put_u32_le(format.sample_rate_hz);
    buf.put_u32_le(byte_rate);
    buf.put_u16_le(block_align);
    buf.put_u16_le(format.bits_per_sample);

    buf.put_slice(b"data");
    buf.put_u32_le(data_size);

    if buf.len() != WAV_HEADER_LEN {
        return Err(AudioError::ContainerBuild(format!(
            "header length {} does not match the canonical {WAV_HEADER_LEN} bytes",
            buf.len()
        )));
    }

    buf.put_slice(pcm);

    debug!(
        payload_bytes = pcm.len(),
        sample_rate = format.sample_rate_hz,
        bits = format.bits_per_sample,
        channels = format.channel_count,
        "Built WAV container"
    );

    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_header_layout_byte_by_byte() {
        let pcm = [0x01, 0x02, 0x03, 0x04];
        let wav = build_wav(&pcm, &SampleFormat::new(8000, 16, 1)).unwrap();

        let expected_header: [u8; 44] = [
            b'R', b'I', b'F', b'F', 40, 0, 0, 0, // RIFF + 36 + 4
            b'W', b'A', b'V', b'E', //
            b'f', b'm', b't', b' ', 16, 0, 0, 0, // fmt chunk size
            1, 0, // PCM
            1, 0, // channels
            0x40, 0x1F, 0, 0, // 8000 Hz
            0x80, 0x3E, 0, 0, // byte rate 16000
            2, 0, // block align
            16, 0, // bits per sample
            b'd', b'a', b't', b'a', 4, 0, 0, 0,
        ];

        assert_eq!(&wav[..44], &expected_header);
        assert_eq!(&wav[44..], &pcm);
        assert_eq!(wav.len(), 48);
    }

    #[test]
    fn test_size_fields_track_payload_length() {
        let format = SampleFormat::default();
        for len in [0usize, 1, 2, 3, 44, 1000, 48_001] {
            let pcm = vec![0xAB; len];
            let wav = build_wav(&pcm, &format).unwrap();
            assert_eq!(u32_at(&wav, 4), 36 + len as u32, "riff size for {len}");
            assert_eq!(u32_at(&wav, 40), len as u32, "data size for {len}");
            assert_eq!(wav.len(), WAV_HEADER_LEN + len);
        }
    }

    #[test]
    fn test_derived_fields_for_stereo_24_bit() {
        let wav = build_wav(&[0u8; 12], &SampleFormat::new(48_000, 24, 2)).unwrap();
        assert_eq!(u16_at(&wav, 22), 2);
        assert_eq!(u32_at(&wav, 24), 48_000);
        assert_eq!(u32_at(&wav, 28), 48_000 * 2 * 3);
        assert_eq!(u16_at(&wav, 32), 6);
        assert_eq!(u16_at(&wav, 34), 24);
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let wav = build_wav(&[], &SampleFormat::default()).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN);
        assert_eq!(u32_at(&wav, 4), 36);
        assert_eq!(u32_at(&wav, 40), 0);
    }

    #[test]
    fn test_standard_decoder_reads_back_sample_count() {
        let samples: Vec<i16> = (0..480).map(|i| (i * 37 % 2000) as i16 - 1000).collect();
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let wav = build_wav(&pcm, &SampleFormat::new(24_000, 16, 1)).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();

        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.bits_per_sample, 16);

        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_rejects_non_byte_aligned_depth() {
        let result = build_wav(&[0u8; 4], &SampleFormat::new(8000, 12, 1));
        assert!(matches!(result, Err(AudioError::ContainerBuild(_))));

        let result = build_wav(&[0u8; 4], &SampleFormat::new(8000, 16, 0));
        assert!(matches!(result, Err(AudioError::ContainerBuild(_))));
    }

    #[test]
    fn test_rejects_formats_whose_derived_fields_overflow() {
        let result = build_wav(&[0u8; 4], &SampleFormat::new(u32::MAX, 16, 1));
        assert!(matches!(result, Err(AudioError::ContainerBuild(_))));

        let result = build_wav(&[0u8; 4], &SampleFormat::new(24_000, 16, 40_000));
        assert!(matches!(result, Err(AudioError::ContainerBuild(_))));
    }
}
