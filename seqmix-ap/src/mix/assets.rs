//! Decoded asset cache and parallel loading
//!
//! Assets are cached by source URL and shared read-only (`Arc`) between the
//! offline path and every live session. Loading fetches and decodes all
//! missing URLs concurrently; decoding runs on blocking worker threads.

use crate::audio::decoder::Decoder;
use crate::audio::loader::{extension_hint, SourceLoader};
use crate::audio::types::PcmAsset;
use crate::error::{Error, Result};
use crate::mix::resolver::ResolvedSources;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decoded assets keyed by source URL
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    by_url: HashMap<String, Arc<PcmAsset>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, asset: impl Into<Arc<PcmAsset>>) {
        self.by_url.insert(url.into(), asset.into());
    }

    pub fn get(&self, url: &str) -> Option<&Arc<PcmAsset>> {
        self.by_url.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<PcmAsset>)> {
        self.by_url.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// URLs from `urls` that are not cached yet
    pub fn missing<'a>(&self, urls: &'a [String]) -> Vec<&'a str> {
        urls.iter()
            .map(String::as_str)
            .filter(|url| !self.contains(url))
            .collect()
    }
}

/// Resolved sources together with the decoded assets they point at
#[derive(Debug, Clone)]
pub struct ResolvedAssets {
    pub sources: ResolvedSources,
    pub store: AssetStore,
}

impl ResolvedAssets {
    pub fn new(sources: ResolvedSources, store: AssetStore) -> Self {
        Self { sources, store }
    }

    /// Decoded foreground of segment `index`
    pub fn foreground(&self, index: usize) -> Option<&Arc<PcmAsset>> {
        let source = self.sources.segment(index)?;
        self.store.get(&source.foreground.url)
    }

    /// Decoded background of segment `index`, if it has one
    pub fn background(&self, index: usize) -> Option<&Arc<PcmAsset>> {
        let source = self.sources.segment(index)?.background.as_ref()?;
        self.store.get(&source.url)
    }
}

/// Fetches and decodes sources through the loader and decoder capabilities
#[derive(Clone)]
pub struct AssetFetcher {
    loader: Arc<dyn SourceLoader>,
    decoder: Arc<dyn Decoder>,
}

impl AssetFetcher {
    pub fn new(loader: Arc<dyn SourceLoader>, decoder: Arc<dyn Decoder>) -> Self {
        Self { loader, decoder }
    }

    /// Fetch and decode one source
    pub async fn fetch_one(&self, url: &str) -> Result<PcmAsset> {
        let bytes = self.loader.fetch(url).await?;
        let hint = extension_hint(url);
        let decoder = Arc::clone(&self.decoder);
        let url_owned = url.to_string();

        let asset = tokio::task::spawn_blocking(move || decoder.decode(bytes, hint.as_deref()))
            .await
            .map_err(|e| Error::Decode(format!("decode task for {} failed: {}", url_owned, e)))?
            .map_err(|e| match e {
                Error::Decode(msg) => Error::Decode(format!("{}: {}", url_owned, msg)),
                other => other,
            })?;

        debug!(
            "Loaded {} ({:.3}s, {}Hz, {} ch)",
            url,
            asset.duration_secs(),
            asset.sample_rate(),
            asset.channel_count()
        );
        Ok(asset)
    }

    /// Fetch and decode every URL concurrently, one result per URL
    pub async fn fetch_all(&self, urls: &[&str]) -> Vec<(String, Result<PcmAsset>)> {
        let results = join_all(urls.iter().map(|url| self.fetch_one(url))).await;
        urls.iter().map(|u| u.to_string()).zip(results).collect()
    }

    /// Load every uncached URL; the first failure aborts
    ///
    /// Nothing is inserted unless every source loads.
    pub async fn load_strict(&self, urls: &[String], store: &mut AssetStore) -> Result<()> {
        let missing = store.missing(urls);
        info!("Loading {} sources ({} cached)", missing.len(), urls.len() - missing.len());

        let mut loaded = Vec::with_capacity(missing.len());
        for (url, result) in self.fetch_all(&missing).await {
            loaded.push((url, result?));
        }
        for (url, asset) in loaded {
            store.insert(url, asset);
        }
        Ok(())
    }

    /// Load every uncached URL, keeping what succeeds
    ///
    /// # Returns
    /// The URLs that failed, with their errors
    pub async fn load_lenient(
        &self,
        urls: &[String],
        store: &mut AssetStore,
    ) -> Vec<(String, Error)> {
        let missing = store.missing(urls);
        info!("Loading {} sources ({} cached)", missing.len(), urls.len() - missing.len());

        let mut failures = Vec::new();
        for (url, result) in self.fetch_all(&missing).await {
            match result {
                Ok(asset) => store.insert(url, asset),
                Err(e) => {
                    warn!("Failed to load {}: {}", url, e);
                    failures.push((url, e));
                }
            }
        }
        failures
    }
}
