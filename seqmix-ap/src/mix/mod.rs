//! Offline mixing
//!
//! Template + uploads → resolver → decoded assets → compositor → mix plan →
//! renderer → PCM buffer → WAV encoder. Every stage is fail-fast: any error
//! aborts the whole merge and no partial output is produced.

pub mod assets;
pub mod compositor;
pub mod conform;
pub mod envelope;
pub mod pipeline;
pub mod renderer;
pub mod resolver;

pub use assets::{AssetFetcher, AssetStore, ResolvedAssets};
pub use compositor::{compose, BackgroundPlacement, MixPlan, Placement, DEFAULT_BACKGROUND_GAIN};
pub use envelope::Envelope;
pub use renderer::render;
pub use resolver::{resolve_sources, ResolvedSources, SegmentSources, SourceKey, SourceRef};
