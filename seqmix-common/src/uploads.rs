//! Upload bindings
//!
//! Users supply audio for placeholder segments as `(placeholderKey, fileUrl)`
//! pairs. The set is keyed by placeholder key; binding the same key twice
//! keeps the last URL.

use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One user-supplied file bound to a placeholder key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBinding {
    pub placeholder_key: String,
    pub file_url: String,
}

impl UploadBinding {
    pub fn new(placeholder_key: impl Into<String>, file_url: impl Into<String>) -> Self {
        Self {
            placeholder_key: placeholder_key.into(),
            file_url: file_url.into(),
        }
    }

    /// Parse the `key=url` form used on the command line
    pub fn parse_pair(text: &str) -> Option<Self> {
        let (key, url) = text.split_once('=')?;
        let key = key.trim();
        let url = url.trim();
        if key.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self::new(key, url))
    }
}

/// Upload bindings keyed by placeholder key (last write wins)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSet {
    by_key: BTreeMap<String, String>,
}

impl UploadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a key, replacing any earlier URL for it
    pub fn bind(&mut self, binding: UploadBinding) {
        self.by_key.insert(binding.placeholder_key, binding.file_url);
    }

    /// URL bound to `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// All bindings in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_key.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Placeholder keys the template needs that have no binding yet
    pub fn missing_for<'t>(&self, template: &'t Template) -> Vec<&'t str> {
        template
            .required_placeholders()
            .into_iter()
            .filter(|key| !self.by_key.contains_key(*key))
            .collect()
    }
}

impl FromIterator<UploadBinding> for UploadSet {
    fn from_iter<I: IntoIterator<Item = UploadBinding>>(iter: I) -> Self {
        let mut set = UploadSet::new();
        for binding in iter {
            set.bind(binding);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let set: UploadSet = vec![
            UploadBinding::new("main", "first.wav"),
            UploadBinding::new("other", "o.wav"),
            UploadBinding::new("main", "second.wav"),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("main"), Some("second.wav"));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            UploadBinding::parse_pair("main-content=/tmp/a.wav"),
            Some(UploadBinding::new("main-content", "/tmp/a.wav"))
        );
        assert_eq!(
            UploadBinding::parse_pair("k=file:///x=y.wav"),
            Some(UploadBinding::new("k", "file:///x=y.wav"))
        );
        assert_eq!(UploadBinding::parse_pair("no-separator"), None);
        assert_eq!(UploadBinding::parse_pair("=a.wav"), None);
        assert_eq!(UploadBinding::parse_pair("k="), None);
    }

    #[test]
    fn test_missing_for_template() {
        let template = Template::from_json(
            r#"{"id":"t","name":"t","fadeIn":0,"fadeOut":0,"audioSequence":[
                {"placeholderKey":"a","label":"1"},
                {"placeholderKey":"b","label":"2"}]}"#,
        )
        .unwrap();

        let mut set = UploadSet::new();
        assert_eq!(set.missing_for(&template), vec!["a", "b"]);

        set.bind(UploadBinding::new("b", "b.wav"));
        assert_eq!(set.missing_for(&template), vec!["a"]);

        set.bind(UploadBinding::new("a", "a.wav"));
        assert!(set.missing_for(&template).is_empty());
    }
}
