//! Source fetching
//!
//! Maps a source URL to encoded bytes. Network transport is out of scope, so
//! the bundled loader only reads local files: plain paths and `file://` URLs,
//! relative ones anchored at the configured asset root.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fetch capability for encoded source bytes
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Fetch the complete encoded file behind `url`
    ///
    /// # Errors
    /// `SourceUnavailable` when the source cannot be read.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed loader
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path for a source URL
    ///
    /// # Errors
    /// `SourceUnavailable` for remote (`http`/`https`) or other non-file schemes.
    pub fn resolve_path(&self, url: &str) -> Result<PathBuf> {
        let path = if let Some(rest) = url.strip_prefix("file://") {
            rest
        } else if url.starts_with("http://") || url.starts_with("https://") {
            return Err(unavailable(url, "remote sources are not supported"));
        } else if has_scheme(url) {
            return Err(unavailable(url, "unsupported URL scheme"));
        } else {
            url
        };

        let path = Path::new(path);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.root.join(path))
        }
    }
}

#[async_trait]
impl SourceLoader for FsLoader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve_path(url)?;
        debug!("Reading source {} from {}", url, path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| unavailable(url, &format!("{}: {}", path.display(), e)))
    }
}

/// File extension of a source URL, used as a decoder hint
pub fn extension_hint(url: &str) -> Option<String> {
    let name = url.rsplit('/').next()?;
    let name = name.split(['?', '#']).next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

fn has_scheme(url: &str) -> bool {
    // Single-letter "schemes" are Windows drive letters
    match url.split_once("://") {
        Some((scheme, _)) => {
            scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
        }
        None => false,
    }
}

fn unavailable(url: &str, reason: &str) -> Error {
    Error::SourceUnavailable {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_file_urls() {
        let loader = FsLoader::new("/srv/audio");
        assert_eq!(
            loader.resolve_path("intro.wav").unwrap(),
            PathBuf::from("/srv/audio/intro.wav")
        );
        assert_eq!(
            loader.resolve_path("file:///tmp/a.wav").unwrap(),
            PathBuf::from("/tmp/a.wav")
        );
        assert_eq!(
            loader.resolve_path("file://clips/b.wav").unwrap(),
            PathBuf::from("/srv/audio/clips/b.wav")
        );
    }

    #[test]
    fn test_remote_urls_unavailable() {
        let loader = FsLoader::new(".");
        let err = loader
            .resolve_path("https://audio-samples.github.io/samples/mp3/music/sample-4.mp3")
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
        assert!(loader.resolve_path("ftp://host/a.wav").is_err());
    }

    #[test]
    fn test_extension_hint() {
        assert_eq!(extension_hint("a/b/Track.MP3"), Some("mp3".to_string()));
        assert_eq!(extension_hint("https://x/y.flac?sig=1"), Some("flac".to_string()));
        assert_eq!(extension_hint("noext"), None);
        assert_eq!(extension_hint("dir.d/noext"), None);
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsLoader::new(dir.path());
        let err = loader.fetch("absent.wav").await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.bin"), [1u8, 2, 3]).unwrap();
        let loader = FsLoader::new(dir.path());
        assert_eq!(loader.fetch("x.bin").await.unwrap(), vec![1, 2, 3]);
    }
}
