//! Offline renderer
//!
//! Sums every placement of a [`MixPlan`] into one interleaved stereo buffer.
//! Deterministic and single-pass: the same plan and assets always produce the
//! same samples. No clamping or normalization happens here; the WAV encoder
//! clamps once at the end.

use crate::audio::types::{PcmAsset, PcmBuffer};
use crate::error::{Error, Result};
use crate::mix::assets::ResolvedAssets;
use crate::mix::compositor::MixPlan;
use crate::mix::envelope::Envelope;
use tracing::{debug, info};

/// Render `plan` into a stereo buffer
///
/// The sample rate is taken from the first placement's foreground asset and
/// every other asset must share it. The buffer holds
/// `ceil(total_duration × sample_rate)` frames.
///
/// # Errors
/// - `AssetResolution` when an asset named by the plan is absent
/// - `SampleRateMismatch` when an asset is at a different rate
/// - `Render` for an empty plan or when the buffer cannot be allocated
pub fn render(plan: &MixPlan, assets: &ResolvedAssets) -> Result<PcmBuffer> {
    let first = plan
        .placements
        .first()
        .ok_or_else(|| Error::Render("mix plan has no placements".to_string()))?;
    let sample_rate = foreground(assets, first.segment_index)?.sample_rate();
    let rate = sample_rate as f64;

    let frames = frame_count(plan.total_duration, sample_rate);
    info!(
        "Rendering {} placements: {:.3}s at {}Hz ({} frames)",
        plan.placements.len(),
        plan.total_duration,
        sample_rate,
        frames
    );

    let mut buffer = PcmBuffer::silent(sample_rate, frames)?;

    for placement in &plan.placements {
        let index = placement.segment_index;
        let asset = foreground(assets, index)?;
        check_rate(assets, index, asset, sample_rate, false)?;

        mix_into(
            &mut buffer,
            asset,
            placement.start_seconds,
            1.0,
            &placement.envelope,
            rate,
        );

        if placement.background.is_empty() {
            continue;
        }
        let bg = assets.background(index).ok_or_else(|| {
            Error::AssetResolution(format!("segment {} background is not decoded", index))
        })?;
        check_rate(assets, index, bg, sample_rate, true)?;

        for loop_placement in &placement.background {
            mix_into(
                &mut buffer,
                bg,
                loop_placement.start_seconds,
                loop_placement.gain,
                &placement.envelope,
                rate,
            );
        }

        debug!(
            "Mixed segment {} with {} background loops",
            index,
            placement.background.len()
        );
    }

    Ok(buffer)
}

/// Output frame count for a program length: `ceil(duration × rate)`
///
/// Values within 1e-6 frames above an integer round down. Durations are
/// sums of segment lengths, and e.g. `(0.1 + 0.2) × 10` evaluates to
/// `3.0000000000000004`, which a plain `ceil` would turn into 4 frames.
pub fn frame_count(total_duration: f64, sample_rate: u32) -> usize {
    let exact = total_duration * sample_rate as f64;
    (exact - 1e-6).ceil().max(0.0) as usize
}

/// Add `asset × gain × envelope` into `buffer` starting at `start` seconds
fn mix_into(
    buffer: &mut PcmBuffer,
    asset: &PcmAsset,
    start: f64,
    gain: f32,
    envelope: &Envelope,
    rate: f64,
) {
    let start_frame = (start * rate).round() as usize;
    for i in 0..asset.frame_count() {
        let t = start + i as f64 / rate;
        let g = gain * envelope.gain_at(t);
        if g == 0.0 {
            continue;
        }
        let (left, right) = asset.stereo_frame(i);
        buffer.accumulate(start_frame + i, left * g, right * g);
    }
}

fn foreground(assets: &ResolvedAssets, index: usize) -> Result<&PcmAsset> {
    assets
        .foreground(index)
        .map(|a| a.as_ref())
        .ok_or_else(|| {
            Error::AssetResolution(format!("segment {} foreground is not decoded", index))
        })
}

fn check_rate(
    assets: &ResolvedAssets,
    index: usize,
    asset: &PcmAsset,
    expected: u32,
    background: bool,
) -> Result<()> {
    if asset.sample_rate() == expected {
        return Ok(());
    }
    let source_key = assets
        .sources
        .segment(index)
        .and_then(|s| {
            if background {
                s.background.as_ref().map(|b| b.url.clone())
            } else {
                Some(s.foreground.url.clone())
            }
        })
        .unwrap_or_else(|| format!("segment {}", index));
    Err(Error::SampleRateMismatch {
        source_key,
        expected,
        found: asset.sample_rate(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::assets::AssetStore;
    use crate::mix::compositor::compose;
    use crate::mix::resolver::resolve_sources;
    use seqmix_common::{Template, UploadSet};

    fn constant(rate: u32, frames: usize, value: f32) -> PcmAsset {
        PcmAsset::new(rate, vec![vec![value; frames]]).unwrap()
    }

    fn setup(json: &str, files: Vec<(&str, PcmAsset)>) -> (Template, ResolvedAssets) {
        let template = Template::from_json(json).unwrap();
        let sources = resolve_sources(&template, &UploadSet::new()).unwrap();
        let mut store = AssetStore::new();
        for (url, asset) in files {
            store.insert(url, asset);
        }
        (template, ResolvedAssets::new(sources, store))
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(10.0, 44100), 441000);
        assert_eq!(frame_count(0.5, 3), 2);
        assert_eq!(frame_count(0.0, 44100), 0);
        assert_eq!(frame_count(0.1 + 0.2, 10), 3);
        // A real fraction of a frame still rounds up
        assert_eq!(frame_count(4.000_01, 100), 401);
    }

    #[test]
    fn test_no_fades_copies_signal() {
        let (template, assets) = setup(
            r#"{"id":"t","name":"t","fadeIn":0,"fadeOut":0,"audioSequence":[
                {"fileUrl":"a.wav","label":"A"}]}"#,
            vec![("a.wav", constant(100, 100, 0.5))],
        );
        let plan = compose(&template, &assets).unwrap();
        let buffer = render(&plan, &assets).unwrap();

        assert_eq!(buffer.frame_count(), 100);
        assert!(buffer.samples().iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_fade_in_ramps_from_zero() {
        let (template, assets) = setup(
            r#"{"id":"t","name":"t","fadeIn":0.5,"fadeOut":0,"audioSequence":[
                {"fileUrl":"a.wav","label":"A"}]}"#,
            vec![("a.wav", constant(100, 100, 1.0))],
        );
        let plan = compose(&template, &assets).unwrap();
        let buffer = render(&plan, &assets).unwrap();

        assert_eq!(buffer.frame(0), Some((0.0, 0.0)));
        let (l, r) = buffer.frame(25).unwrap();
        assert!((l - 0.5).abs() < 1e-6 && l == r);
        assert_eq!(buffer.frame(60), Some((1.0, 1.0)));
    }

    #[test]
    fn test_background_summed_under_envelope() {
        let (template, assets) = setup(
            r#"{"id":"t","name":"t","fadeIn":0,"fadeOut":0,"audioSequence":[
                {"fileUrl":"a.wav","backgroundMusic":"bed.wav","label":"A"}]}"#,
            vec![
                ("a.wav", constant(100, 100, 0.5)),
                ("bed.wav", constant(100, 30, 1.0)),
            ],
        );
        let plan = compose(&template, &assets).unwrap();
        let buffer = render(&plan, &assets).unwrap();

        // 4 loops of 30 frames cover 100 frames; tail past the end is dropped
        assert_eq!(plan.placements[0].background.len(), 4);
        assert_eq!(buffer.frame_count(), 100);
        for i in 0..100 {
            let (l, _) = buffer.frame(i).unwrap();
            assert!((l - 0.8).abs() < 1e-6, "frame {} = {}", i, l);
        }
    }

    #[test]
    fn test_sums_are_not_clamped() {
        let (template, assets) = setup(
            r#"{"id":"t","name":"t","fadeIn":0,"fadeOut":0,"audioSequence":[
                {"fileUrl":"a.wav","backgroundMusic":"bed.wav","label":"A"}]}"#,
            vec![
                ("a.wav", constant(100, 10, 1.0)),
                ("bed.wav", constant(100, 10, 1.0)),
            ],
        );
        let plan = compose(&template, &assets).unwrap();
        let buffer = render(&plan, &assets).unwrap();
        assert!((buffer.samples()[0] - 1.3).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_channels_kept_apart() {
        let stereo = PcmAsset::new(100, vec![vec![0.25; 10], vec![-0.75; 10]]).unwrap();
        let (template, assets) = setup(
            r#"{"id":"t","name":"t","fadeIn":0,"fadeOut":0,"audioSequence":[
                {"fileUrl":"s.wav","label":"S"}]}"#,
            vec![("s.wav", stereo)],
        );
        let plan = compose(&template, &assets).unwrap();
        let buffer = render(&plan, &assets).unwrap();
        assert_eq!(buffer.frame(3), Some((0.25, -0.75)));
    }

    #[test]
    fn test_rate_mismatch_rejected() {
        let (template, assets) = setup(
            r#"{"id":"t","name":"t","fadeIn":0,"fadeOut":0,"audioSequence":[
                {"fileUrl":"a.wav","label":"A"},
                {"fileUrl":"b.wav","label":"B"}]}"#,
            vec![
                ("a.wav", constant(100, 10, 0.1)),
                ("b.wav", constant(200, 20, 0.1)),
            ],
        );
        let plan = compose(&template, &assets).unwrap();
        match render(&plan, &assets).unwrap_err() {
            Error::SampleRateMismatch {
                source_key,
                expected,
                found,
            } => {
                assert_eq!(source_key, "b.wav");
                assert_eq!((expected, found), (100, 200));
            }
            other => panic!("expected SampleRateMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_deterministic() {
        let (template, assets) = setup(
            r#"{"id":"t","name":"t","fadeIn":0.2,"fadeOut":0.3,"audioSequence":[
                {"fileUrl":"a.wav","backgroundMusic":"bed.wav","label":"A"},
                {"fileUrl":"a.wav","label":"B"}]}"#,
            vec![
                ("a.wav", constant(100, 77, 0.4)),
                ("bed.wav", constant(100, 13, -0.2)),
            ],
        );
        let plan = compose(&template, &assets).unwrap();
        let a = render(&plan, &assets).unwrap();
        let b = render(&plan, &assets).unwrap();
        assert_eq!(a, b);
    }
}
