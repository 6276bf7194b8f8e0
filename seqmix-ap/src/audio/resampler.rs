//! Audio resampling using rubato
//!
//! Converts a decoded asset to the target rate of a composition so that every
//! placement can be summed frame-for-frame.

use crate::audio::types::PcmAsset;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler using rubato for sample rate conversion.
pub struct Resampler;

impl Resampler {
    /// Resample an asset to `output_rate`
    ///
    /// # Returns
    /// A new planar asset at `output_rate` whose frame count is
    /// `round(frames × output_rate / input_rate)`, so its duration matches
    /// the source to within one output frame.
    ///
    /// # Notes
    /// If the asset is already at `output_rate`, returns a copy without
    /// resampling.
    pub fn resample(asset: &PcmAsset, output_rate: u32) -> Result<PcmAsset> {
        let input_rate = asset.sample_rate();
        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(asset.clone());
        }
        if output_rate == 0 {
            return Err(Error::Decode("Cannot resample to 0 Hz".to_string()));
        }

        let input_frames = asset.frame_count();
        let channels = asset.channel_count();
        let expected_frames =
            (input_frames as f64 * output_rate as f64 / input_rate as f64).round() as usize;

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels, {} frames)",
            input_rate, output_rate, channels, input_frames
        );

        if input_frames == 0 {
            return PcmAsset::new(output_rate, vec![Vec::new(); channels]);
        }

        let mut resampler = Self::create_resampler(input_rate, output_rate, channels, input_frames)?;

        let mut planar_output = resampler
            .process(asset.channels(), None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        // The polynomial resampler may be a few frames short or long; pin the
        // length so the asset keeps its duration.
        for channel in planar_output.iter_mut() {
            channel.resize(expected_frames, 0.0);
        }

        debug!(
            "Resampled {} input frames to {} output frames",
            input_frames, expected_frames
        );

        PcmAsset::new(output_rate, planar_output)
    }

    /// Create a rubato resampler.
    ///
    /// Uses FastFixedIn with the whole asset as one chunk.
    fn create_resampler(
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        chunk_size: usize,
    ) -> Result<FastFixedIn<f32>> {
        FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0, // max_relative_ratio (no runtime changes)
            PolynomialDegree::Septic,
            chunk_size,
            channels,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))
    }
}
