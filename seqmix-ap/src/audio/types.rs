//! Core audio data types
//!
//! `PcmAsset` is what a decoder produces: planar channels at the source rate.
//! `PcmBuffer` is what the renderer produces: interleaved stereo at the target
//! rate, handed to the encoder by value.

use crate::error::{Error, Result};

/// Channel count of every rendered buffer
pub const OUTPUT_CHANNELS: u16 = 2;

/// Decoded audio, read-only once built
///
/// **Format:**
/// - Samples are f32 (nominally -1.0 to 1.0)
/// - Planar: one `Vec<f32>` per channel, all the same length
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAsset {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmAsset {
    /// Build an asset from planar channel data
    ///
    /// # Errors
    /// - zero sample rate
    /// - no channels
    /// - channels of different lengths
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::Decode("sample rate must be > 0".to_string()));
        }
        let Some(first) = channels.first() else {
            return Err(Error::Decode("asset has no channels".to_string()));
        };
        let frames = first.len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(Error::Decode("channels have different lengths".to_string()));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Build an asset from interleaved samples
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(samples: &[f32], sample_rate: u32, channel_count: u16) -> Result<Self> {
        if channel_count == 0 {
            return Err(Error::Decode("asset has no channels".to_string()));
        }
        let count = channel_count as usize;
        let frames = samples.len() / count;
        let mut channels = vec![Vec::with_capacity(frames); count];
        for frame in samples.chunks_exact(count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Duration in seconds (frame count / sample rate)
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Planar samples of one channel
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Stereo view of one frame
    ///
    /// Mono is duplicated into both sides; channels past the second are ignored.
    #[inline]
    pub fn stereo_frame(&self, index: usize) -> (f32, f32) {
        let left = self.channels[0][index];
        let right = if self.channels.len() > 1 {
            self.channels[1][index]
        } else {
            left
        };
        (left, right)
    }
}

/// Rendered program: interleaved stereo f32 at one sample rate
///
/// Index pattern: 0=left, 1=right, 2=left, 3=right, etc.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl PcmBuffer {
    /// Allocate a zeroed buffer
    ///
    /// # Errors
    /// `Render` when the allocation cannot be satisfied.
    pub fn silent(sample_rate: u32, frames: usize) -> Result<Self> {
        let len = frames
            .checked_mul(OUTPUT_CHANNELS as usize)
            .ok_or_else(|| Error::Render(format!("{} frames overflow the buffer size", frames)))?;
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(len)
            .map_err(|e| Error::Render(format!("cannot allocate {} frames: {}", frames, e)))?;
        samples.resize(len, 0.0);
        Ok(Self {
            sample_rate,
            samples,
        })
    }

    /// Wrap already interleaved stereo samples
    ///
    /// A trailing odd sample is dropped.
    pub fn from_interleaved(sample_rate: u32, mut samples: Vec<f32>) -> Self {
        let whole = samples.len() - samples.len() % OUTPUT_CHANNELS as usize;
        samples.truncate(whole);
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / OUTPUT_CHANNELS as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sum a stereo frame into the buffer; frames past the end are ignored
    #[inline]
    pub fn accumulate(&mut self, frame: usize, left: f32, right: f32) {
        let index = frame * 2;
        if let Some(slot) = self.samples.get_mut(index..index + 2) {
            slot[0] += left;
            slot[1] += right;
        }
    }

    /// Stereo frame at `index`
    pub fn frame(&self, index: usize) -> Option<(f32, f32)> {
        let i = index * 2;
        Some((*self.samples.get(i)?, *self.samples.get(i + 1)?))
    }
}
