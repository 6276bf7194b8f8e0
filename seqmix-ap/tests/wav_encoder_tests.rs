//! WAV container tests
//!
//! Checks the header byte layout field by field and reads encoder output back
//! through hound.

mod helpers;

use helpers::audio_generator::{read_wav, read_wav_bytes};
use seqmix_ap::audio::wav::{encode_wav, write_wav, WAV_HEADER_LEN};
use seqmix_ap::audio::PcmBuffer;
use tempfile::TempDir;

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
fn test_silence_header_and_data() {
    for (rate, frames) in [(44100u32, 441_000usize), (48000, 12_345), (22050, 1)] {
        let bytes = encode_wav(PcmBuffer::silent(rate, frames).unwrap()).unwrap();
        let data_bytes = frames as u32 * 4;

        assert_eq!(bytes.len(), WAV_HEADER_LEN + data_bytes as usize);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + data_bytes);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 2);
        assert_eq!(u32_at(&bytes, 24), rate);
        assert_eq!(u32_at(&bytes, 28), rate * 4);
        assert_eq!(u16_at(&bytes, 32), 4);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), data_bytes);
        assert!(bytes[WAV_HEADER_LEN..].iter().all(|&b| b == 0));
    }
}

#[test]
fn test_empty_buffer_is_header_only() {
    let bytes = encode_wav(PcmBuffer::silent(44100, 0).unwrap()).unwrap();
    assert_eq!(bytes.len(), WAV_HEADER_LEN);
    assert_eq!(u32_at(&bytes, 4), 36);
    assert_eq!(u32_at(&bytes, 40), 0);
}

#[test]
fn test_out_of_range_sums_clamped_not_wrapped() {
    let buffer = PcmBuffer::from_interleaved(44100, vec![1.3, -1.7, 0.5, -0.5, 1.0, -1.0]);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clamped.wav");

    write_wav(&path, buffer).unwrap();
    let (spec, samples) = read_wav(&path);

    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(samples, vec![32767, -32768, 16383, -16384, 32767, -32768]);
}

#[test]
fn test_file_and_memory_images_match() {
    let samples = vec![0.25, -0.25, 2.0, -2.0, 0.0, 0.75];
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image.wav");

    write_wav(&path, PcmBuffer::from_interleaved(22050, samples.clone())).unwrap();
    let bytes = encode_wav(PcmBuffer::from_interleaved(22050, samples)).unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), bytes);
    assert_eq!(bytes.len(), WAV_HEADER_LEN + 12);

    let (spec, decoded) = read_wav_bytes(&bytes);
    assert_eq!(spec.sample_rate, 22050);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(decoded, vec![8191, -8192, 32767, -32768, 0, 24575]);
}
