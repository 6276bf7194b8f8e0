//! Sample-rate conformance
//!
//! The renderer sums frame-for-frame and refuses mixed rates. Before
//! rendering, every decoded asset is brought to the target rate (that of the
//! first segment's foreground) or the merge is rejected, depending on policy.

use crate::audio::resampler::Resampler;
use crate::error::{Error, Result};
use crate::mix::assets::{AssetStore, ResolvedAssets};
use seqmix_common::config::SampleRatePolicy;
use tracing::info;

/// Conform every asset in `assets` to the target rate
///
/// # Returns
/// The target sample rate
///
/// # Errors
/// - `AssetResolution` when the first segment has no decoded foreground
/// - `SampleRateMismatch` under `Reject` for the first asset at another rate
/// - `Decode` when resampling fails
pub fn conform_sample_rates(
    assets: &mut ResolvedAssets,
    policy: SampleRatePolicy,
) -> Result<u32> {
    let target = assets
        .foreground(0)
        .map(|a| a.sample_rate())
        .ok_or_else(|| {
            Error::AssetResolution("first segment has no decoded foreground audio".to_string())
        })?;

    // Sorted for a stable error when several assets mismatch
    let mut mismatched: Vec<(String, u32)> = assets
        .store
        .iter()
        .filter(|(_, asset)| asset.sample_rate() != target)
        .map(|(url, asset)| (url.to_string(), asset.sample_rate()))
        .collect();
    mismatched.sort();

    if mismatched.is_empty() {
        return Ok(target);
    }

    match policy {
        SampleRatePolicy::Reject => {
            let (source_key, found) = mismatched.swap_remove(0);
            Err(Error::SampleRateMismatch {
                source_key,
                expected: target,
                found,
            })
        }
        SampleRatePolicy::Resample => {
            let mut converted = AssetStore::new();
            for (url, found) in &mismatched {
                info!("Resampling {} from {}Hz to {}Hz", url, found, target);
                if let Some(asset) = assets.store.get(url) {
                    converted.insert(url.clone(), Resampler::resample(asset, target)?);
                }
            }
            for (url, asset) in converted.iter() {
                assets.store.insert(url, asset.clone());
            }
            Ok(target)
        }
    }
}
