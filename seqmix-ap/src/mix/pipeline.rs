//! Offline merge pipeline
//!
//! Runs the whole offline path for one template:
//! 1. resolve sources (a missing upload fails here, before any fetch)
//! 2. fetch + decode every distinct source in parallel, strict
//! 3. conform sample rates
//! 4. compose the mix plan
//! 5. render, then encode as WAV
//!
//! Steps 3-5 are one batch computation and run on a blocking worker thread.

use crate::audio::types::PcmBuffer;
use crate::audio::wav::encode_wav;
use crate::error::{Error, Result};
use crate::mix::assets::{AssetFetcher, AssetStore, ResolvedAssets};
use crate::mix::compositor::{compose_with_gain, MixPlan, DEFAULT_BACKGROUND_GAIN};
use crate::mix::conform::conform_sample_rates;
use crate::mix::renderer::render;
use crate::mix::resolver::resolve_sources;
use seqmix_common::config::{MixConfig, SampleRatePolicy};
use seqmix_common::{Template, UploadSet};
use tracing::info;

/// Suggested file name for merged output
pub const DEFAULT_OUTPUT_NAME: &str = "merged_audio.wav";

/// Knobs of the offline path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    pub background_gain: f32,
    pub sample_rate_policy: SampleRatePolicy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            background_gain: DEFAULT_BACKGROUND_GAIN,
            sample_rate_policy: SampleRatePolicy::Resample,
        }
    }
}

impl From<&MixConfig> for MergeOptions {
    fn from(config: &MixConfig) -> Self {
        Self {
            background_gain: config.background_gain,
            sample_rate_policy: config.sample_rate_policy,
        }
    }
}

/// A rendered program and the plan it came from
#[derive(Debug, Clone)]
pub struct RenderedProgram {
    pub plan: MixPlan,
    pub buffer: PcmBuffer,
}

/// Resolve, load, compose and render `template`
pub async fn render_template(
    template: &Template,
    uploads: &UploadSet,
    fetcher: &AssetFetcher,
    options: MergeOptions,
) -> Result<RenderedProgram> {
    info!("Merging template '{}' ({} segments)", template.id, template.segments.len());

    let sources = resolve_sources(template, uploads)?;

    let mut store = AssetStore::new();
    fetcher.load_strict(&sources.distinct_urls(), &mut store).await?;

    let template = template.clone();
    let mut assets = ResolvedAssets::new(sources, store);

    tokio::task::spawn_blocking(move || {
        conform_sample_rates(&mut assets, options.sample_rate_policy)?;
        let plan = compose_with_gain(&template, &assets, options.background_gain)?;
        let buffer = render(&plan, &assets)?;
        info!(
            "Rendered {:.3}s ({} frames at {}Hz)",
            plan.total_duration,
            buffer.frame_count(),
            buffer.sample_rate()
        );
        Ok(RenderedProgram { plan, buffer })
    })
    .await
    .map_err(|e| Error::Render(format!("render task failed: {}", e)))?
}

/// Merge `template` into a finished WAV file image
///
/// Fail-fast: any error aborts and no partial output is returned.
pub async fn merge_template(
    template: &Template,
    uploads: &UploadSet,
    fetcher: &AssetFetcher,
    options: MergeOptions,
) -> Result<Vec<u8>> {
    let program = render_template(template, uploads, fetcher, options).await?;
    encode_wav(program.buffer)
}
