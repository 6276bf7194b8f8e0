//! Asset resolution
//!
//! Maps every segment to the URL its audio comes from. A placeholder segment
//! takes the URL of the upload bound under its key; without one the whole
//! resolution fails with `MissingUpload` before anything is fetched or
//! decoded. Background sources are pre-bound URLs and never required.

use crate::error::{Error, Result};
use seqmix_common::template::SourceSelector;
use seqmix_common::{Template, UploadSet};
use serde::Serialize;
use tracing::debug;

/// Selector a source was resolved from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SourceKey {
    /// Fixed URL from the template
    Url(String),
    /// Placeholder key bound to an upload
    Placeholder(String),
}

/// A resolved source: the selector and the URL it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub key: SourceKey,
    pub url: String,
}

/// Sources of one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSources {
    pub foreground: SourceRef,
    pub background: Option<SourceRef>,
}

/// Per-segment sources in template order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResolvedSources {
    segments: Vec<SegmentSources>,
}

impl ResolvedSources {
    pub fn segment(&self, index: usize) -> Option<&SegmentSources> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentSources> {
        self.segments.iter()
    }

    /// Every distinct URL referenced, foreground and background, in first-use order
    pub fn distinct_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for segment in &self.segments {
            let refs = std::iter::once(&segment.foreground).chain(segment.background.as_ref());
            for source in refs {
                if !urls.contains(&source.url) {
                    urls.push(source.url.clone());
                }
            }
        }
        urls
    }
}

/// Resolve every segment of `template` against `uploads`
///
/// # Errors
/// - `MissingUpload(key)` for the first placeholder segment without a binding
/// - `Common(InvalidTemplate)` for a segment with no usable selector
pub fn resolve_sources(template: &Template, uploads: &UploadSet) -> Result<ResolvedSources> {
    let mut segments = Vec::with_capacity(template.segments.len());

    for (index, segment) in template.segments.iter().enumerate() {
        let foreground = match segment.selector() {
            Some(SourceSelector::Fixed(url)) => SourceRef {
                key: SourceKey::Url(url.to_string()),
                url: url.to_string(),
            },
            Some(SourceSelector::Placeholder(key)) => {
                let url = uploads
                    .get(key)
                    .ok_or_else(|| Error::MissingUpload(key.to_string()))?;
                SourceRef {
                    key: SourceKey::Placeholder(key.to_string()),
                    url: url.to_string(),
                }
            }
            None => {
                return Err(seqmix_common::Error::InvalidTemplate(format!(
                    "segment {} must set exactly one of fileUrl or placeholderKey",
                    index
                ))
                .into());
            }
        };

        let background = segment.background_music.as_ref().map(|url| SourceRef {
            key: SourceKey::Url(url.clone()),
            url: url.clone(),
        });

        debug!(
            "Segment {} ('{}') -> {}{}",
            index,
            segment.label,
            foreground.url,
            background
                .as_ref()
                .map(|b| format!(" over {}", b.url))
                .unwrap_or_default()
        );

        segments.push(SegmentSources {
            foreground,
            background,
        });
    }

    Ok(ResolvedSources { segments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqmix_common::UploadBinding;

    fn template() -> Template {
        Template::from_json(
            r#"{"id":"t","name":"t","fadeIn":1,"fadeOut":1,"audioSequence":[
                {"fileUrl":"intro.wav","label":"Intro"},
                {"placeholderKey":"main","backgroundMusic":"bed.wav","label":"Main"},
                {"fileUrl":"intro.wav","backgroundMusic":"bed.wav","label":"Reprise"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolves_fixed_and_placeholder() {
        let uploads: UploadSet = vec![UploadBinding::new("main", "uploads/voice.wav")]
            .into_iter()
            .collect();
        let sources = resolve_sources(&template(), &uploads).unwrap();

        assert_eq!(sources.len(), 3);
        let main = sources.segment(1).unwrap();
        assert_eq!(main.foreground.key, SourceKey::Placeholder("main".to_string()));
        assert_eq!(main.foreground.url, "uploads/voice.wav");
        assert_eq!(main.background.as_ref().map(|b| b.url.as_str()), Some("bed.wav"));
        assert!(sources.segment(0).unwrap().background.is_none());
    }

    #[test]
    fn test_distinct_urls_dedup() {
        let uploads: UploadSet = vec![UploadBinding::new("main", "voice.wav")]
            .into_iter()
            .collect();
        let sources = resolve_sources(&template(), &uploads).unwrap();
        assert_eq!(sources.distinct_urls(), vec!["intro.wav", "voice.wav", "bed.wav"]);
    }

    #[test]
    fn test_missing_upload_names_key() {
        let err = resolve_sources(&template(), &UploadSet::new()).unwrap_err();
        match err {
            Error::MissingUpload(key) => assert_eq!(key, "main"),
            other => panic!("expected MissingUpload, got {:?}", other),
        }
    }
}
