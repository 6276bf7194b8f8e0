//! Audio test file generation utilities
//!
//! Writes deterministic 16-bit WAV files with known characteristics:
//! - constant level (exactly representable, so rendered samples can be
//!   compared without tolerance)
//! - sine tones
//!
//! Files can go to disk (for `FsLoader`) or stay in memory (for
//! `MemoryLoader`).

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

fn spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn frames(sample_rate: u32, duration_secs: f64) -> usize {
    (sample_rate as f64 * duration_secs).round() as usize
}

/// Write a constant-level WAV file
///
/// `level` is a fraction of full scale; 0.5 encodes as 16384 and decodes back
/// to exactly 0.5.
pub fn write_constant_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_secs: f64,
    level: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;
    let value = (level * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
    for _ in 0..frames(sample_rate, duration_secs) * channels as usize {
        writer.write_sample(value)?;
    }
    writer.finalize()
}

/// Write a sine tone WAV file (same signal on every channel)
pub fn write_sine_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_secs: f64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;
    for n in 0..frames(sample_rate, duration_secs) {
        let t = n as f32 / sample_rate as f32;
        let sample = (amplitude * (2.0 * PI * frequency_hz * t).sin() * 32767.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()
}

/// Encode a constant-level WAV file in memory
pub fn constant_wav_bytes(sample_rate: u32, channels: u16, duration_secs: f64, level: f32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec(sample_rate, channels))
            .expect("Failed to create in-memory WAV writer");
        let value = (level * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
        for _ in 0..frames(sample_rate, duration_secs) * channels as usize {
            writer.write_sample(value).expect("Failed to write sample");
        }
        writer.finalize().expect("Failed to finalize WAV");
    }
    cursor.into_inner()
}

/// Read a 16-bit WAV file back as (spec, interleaved samples)
pub fn read_wav<P: AsRef<Path>>(path: P) -> (WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::open(path).expect("Failed to open WAV");
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to read samples");
    (spec, samples)
}

/// Read an in-memory 16-bit WAV image back as (spec, interleaved samples)
pub fn read_wav_bytes(bytes: &[u8]) -> (WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).expect("Failed to parse WAV");
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to read samples");
    (spec, samples)
}
