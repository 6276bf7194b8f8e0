//! Timeline compositor
//!
//! Pure function from a template and its resolved assets to a [`MixPlan`]:
//! segments are laid end to end (no overlap offline), each with its envelope
//! and the tiling of its looped background.

use crate::error::{Error, Result};
use crate::mix::assets::ResolvedAssets;
use crate::mix::envelope::Envelope;
use seqmix_common::Template;
use serde::Serialize;
use tracing::{debug, warn};

/// Relative gain of background loops under a segment
pub const DEFAULT_BACKGROUND_GAIN: f32 = 0.3;

/// Renderer-ready schedule of a whole program
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixPlan {
    /// One placement per segment, in template order
    pub placements: Vec<Placement>,
    /// Authoritative program length in seconds
    pub total_duration: f64,
}

/// One segment on the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub segment_index: usize,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub envelope: Envelope,
    pub background: Vec<BackgroundPlacement>,
}

/// One instance of a looped background
///
/// The last instance may run past the segment end; the segment envelope
/// silences that tail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackgroundPlacement {
    pub start_seconds: f64,
    pub duration_seconds: f64,
    /// Applied before the segment envelope
    pub gain: f32,
}

/// Number of background loops needed to cover a segment
///
/// `ceil(segment_duration / background_duration)`, or 0 when the background
/// has no length.
pub fn loop_count(segment_duration: f64, background_duration: f64) -> usize {
    if background_duration <= 0.0 || !background_duration.is_finite() || segment_duration <= 0.0 {
        return 0;
    }
    (segment_duration / background_duration).ceil() as usize
}

/// Compose a plan with the default background gain
pub fn compose(template: &Template, assets: &ResolvedAssets) -> Result<MixPlan> {
    compose_with_gain(template, assets, DEFAULT_BACKGROUND_GAIN)
}

/// Compose a plan
///
/// # Errors
/// `AssetResolution` when any segment's foreground asset is absent. No
/// partial plan is returned.
pub fn compose_with_gain(
    template: &Template,
    assets: &ResolvedAssets,
    background_gain: f32,
) -> Result<MixPlan> {
    let mut placements = Vec::with_capacity(template.segments.len());
    let mut cursor = 0.0_f64;

    for (index, segment) in template.segments.iter().enumerate() {
        let asset = assets.foreground(index).ok_or_else(|| {
            Error::AssetResolution(format!(
                "segment {} ('{}') has no decoded foreground audio",
                index, segment.label
            ))
        })?;

        let duration = asset.duration_secs();
        let start = cursor;
        let envelope = Envelope::new(start, duration, template.fade_in, template.fade_out);
        cursor += duration;

        let mut background = Vec::new();
        match (segment.background_music.as_ref(), assets.background(index)) {
            (Some(_), Some(bg)) => {
                let bg_duration = bg.duration_secs();
                let loops = loop_count(duration, bg_duration);
                background.extend((0..loops).map(|i| BackgroundPlacement {
                    start_seconds: start + i as f64 * bg_duration,
                    duration_seconds: bg_duration,
                    gain: background_gain,
                }));
            }
            (Some(url), None) => {
                warn!(
                    "Background {} for segment {} is not decoded, mixing without it",
                    url, index
                );
            }
            (None, _) => {}
        }

        debug!(
            "Placement {}: start={:.3}s duration={:.3}s background loops={}",
            index,
            start,
            duration,
            background.len()
        );

        placements.push(Placement {
            segment_index: index,
            start_seconds: start,
            duration_seconds: duration,
            envelope,
            background,
        });
    }

    Ok(MixPlan {
        placements,
        total_duration: cursor,
    })
}
