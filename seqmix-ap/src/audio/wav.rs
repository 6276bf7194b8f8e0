//! RIFF/WAVE container encoder
//!
//! Writes 16-bit signed little-endian PCM with the canonical 44-byte header
//! through `hound`.
//! This is the only place sample values are clamped: the renderer sums
//! without limiting and out-of-range values are pinned here rather than
//! wrapping.

use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::debug;

/// Size of the canonical header in bytes
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u64 = 2;

/// Convert one float sample to signed 16-bit
///
/// Clamp to `[-1, 1]`, then scale by 32768 for negative values and 32767
/// otherwise, truncating toward zero.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    // `as` truncates toward zero and maps NaN to 0
    scaled as i16
}

fn wav_spec(buffer: &PcmBuffer) -> WavSpec {
    WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

/// Number of data bytes, rejected up front when the RIFF size fields
/// (data + 36) cannot hold it
fn data_len(buffer: &PcmBuffer) -> Result<u64> {
    let data_bytes = buffer.frame_count() as u64 * buffer.channels() as u64 * BYTES_PER_SAMPLE;
    if data_bytes + 36 > u32::MAX as u64 {
        return Err(Error::Render(format!(
            "{} frames exceed the WAV size limit",
            buffer.frame_count()
        )));
    }
    Ok(data_bytes)
}

fn write_samples<W: Write + Seek>(mut writer: WavWriter<W>, buffer: &PcmBuffer) -> Result<()> {
    for &sample in buffer.samples() {
        writer.write_sample(sample_to_i16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Encode a rendered buffer as a WAV file image
///
/// The buffer is consumed; nothing else observes it after encoding.
///
/// # Errors
/// `Render` when the data does not fit the 32-bit RIFF size fields,
/// `Wav` when the writer fails.
pub fn encode_wav(buffer: PcmBuffer) -> Result<Vec<u8>> {
    let data_bytes = data_len(&buffer)?;

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + data_bytes as usize));
    let writer = WavWriter::new(&mut cursor, wav_spec(&buffer))?;
    write_samples(writer, &buffer)?;
    let out = cursor.into_inner();

    debug!(
        "Encoded {} frames at {}Hz ({} bytes)",
        buffer.frame_count(),
        buffer.sample_rate(),
        out.len()
    );

    Ok(out)
}

/// Encode a buffer straight into a file at `path`
pub fn write_wav(path: &Path, buffer: PcmBuffer) -> Result<()> {
    data_len(&buffer)?;
    let writer = WavWriter::create(path, wav_spec(&buffer))?;
    write_samples(writer, &buffer)?;
    debug!("Wrote {} frames to {}", buffer.frame_count(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_conversion() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(-1.0), -32768);
        assert_eq!(sample_to_i16(0.5), 16383);
        assert_eq!(sample_to_i16(-0.5), -16384);
    }

    #[test]
    fn test_out_of_range_clamps_instead_of_wrapping() {
        assert_eq!(sample_to_i16(1.7), 32767);
        assert_eq!(sample_to_i16(-3.0), -32768);
        assert_eq!(sample_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_header_and_length() {
        let buffer = PcmBuffer::silent(8000, 3).unwrap();
        let bytes = encode_wav(buffer).unwrap();

        assert_eq!(bytes.len(), WAV_HEADER_LEN + 12);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 48);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 12);
    }

    #[test]
    fn test_samples_are_interleaved() {
        let buffer = PcmBuffer::from_interleaved(8000, vec![1.0, -1.0]);
        let bytes = encode_wav(buffer).unwrap();
        assert_eq!(i16::from_le_bytes([bytes[44], bytes[45]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[46], bytes[47]]), -32768);
    }
}
