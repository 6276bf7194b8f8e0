//! Test helper modules for seqmix-ap integration tests
//!
//! - audio_generator: deterministic WAV fixtures (disk and in-memory)
//! - MemoryLoader: a `SourceLoader` over a map, counting fetches
//! - template builders

#![allow(dead_code)]

pub mod audio_generator;

use async_trait::async_trait;
use seqmix_ap::audio::{SourceLoader, SymphoniaDecoder};
use seqmix_ap::mix::AssetFetcher;
use seqmix_ap::{Error, Result};
use seqmix_common::template::{Segment, Survey};
use seqmix_common::Template;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory source loader
///
/// Unknown URLs fail with `SourceUnavailable`.
#[derive(Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    /// Fetches attempted so far, failed ones included
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceLoader for MemoryLoader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| Error::SourceUnavailable {
                url: url.to_string(),
                reason: "not in memory loader".to_string(),
            })
    }
}

/// Fetcher over `loader` with the symphonia decoder
pub fn fetcher(loader: Arc<MemoryLoader>) -> AssetFetcher {
    AssetFetcher::new(loader, Arc::new(SymphoniaDecoder::new()))
}

pub fn fixed(url: &str, label: &str) -> Segment {
    Segment {
        file_url: Some(url.to_string()),
        background_music: None,
        placeholder_key: None,
        label: label.to_string(),
        visual_content: None,
    }
}

pub fn placeholder(key: &str, label: &str) -> Segment {
    Segment {
        file_url: None,
        background_music: None,
        placeholder_key: Some(key.to_string()),
        label: label.to_string(),
        visual_content: None,
    }
}

pub fn with_background(mut segment: Segment, url: &str) -> Segment {
    segment.background_music = Some(url.to_string());
    segment
}

pub fn template(segments: Vec<Segment>, fade_in: f64, fade_out: f64) -> Template {
    Template {
        id: "test-template".to_string(),
        name: "Test Template".to_string(),
        segments,
        fade_in,
        fade_out,
        survey: None,
    }
}

pub fn with_survey(mut template: Template, after_index: usize) -> Template {
    template.survey = Some(Survey {
        after_index,
        question: "How was it?".to_string(),
        options: vec!["Great".to_string(), "Okay".to_string()],
    });
    template
}
