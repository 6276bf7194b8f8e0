//! Template document model
//!
//! A template is the declarative description of a program: the ordered
//! segments, the fade lengths applied to every segment, and an optional
//! survey gate. Templates are immutable once loaded.
//!
//! The JSON shape uses the camelCase field names of the authoring tool:
//!
//! ```json
//! {
//!   "id": "podcast-template",
//!   "name": "Podcast Episode",
//!   "audioSequence": [
//!     { "fileUrl": "intro.mp3", "label": "Intro" },
//!     { "placeholderKey": "main-content", "backgroundMusic": "bed.mp3", "label": "Main" }
//!   ],
//!   "fadeIn": 2,
//!   "fadeOut": 3,
//!   "survey": { "afterIndex": 0, "question": "Continue?", "options": ["Yes", "No"] }
//! }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Declarative program description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Stable template identifier
    pub id: String,

    /// Human-readable template name
    pub name: String,

    /// Ordered program segments
    #[serde(rename = "audioSequence")]
    pub segments: Vec<Segment>,

    /// Fade-in length in seconds, applied to every segment
    pub fade_in: f64,

    /// Fade-out length in seconds, applied to every segment
    pub fade_out: f64,

    /// Optional survey gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey: Option<Survey>,
}

/// One ordered unit of the program
///
/// Exactly one of `file_url` / `placeholder_key` must be set. This is checked
/// by [`Template::validate`], not by the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Pre-bound foreground source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,

    /// Looped background source, always pre-bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music: Option<String>,

    /// Upload slot resolved at runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_key: Option<String>,

    /// Display label
    pub label: String,

    /// Presentation metadata, carried but never interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_content: Option<VisualContent>,
}

/// Foreground source selector of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelector<'a> {
    /// Fixed URL
    Fixed(&'a str),
    /// Placeholder key bound to an upload
    Placeholder(&'a str),
}

/// Presentation metadata shown alongside a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualContent {
    /// Content kind
    #[serde(rename = "type")]
    pub kind: VisualKind,

    /// Text content or image URL
    pub content: String,

    /// Optional heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Visual content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    Text,
    Image,
}

/// Survey gate placed after one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    /// Playback pauses after this segment index
    pub after_index: usize,

    /// Question shown to the listener
    pub question: String,

    /// Offered answers, e.g. `["Yes", "No"]`
    pub options: Vec<String>,
}

impl Segment {
    /// Foreground selector, or `None` when the segment sets both or neither
    pub fn selector(&self) -> Option<SourceSelector<'_>> {
        match (&self.file_url, &self.placeholder_key) {
            (Some(url), None) => Some(SourceSelector::Fixed(url)),
            (None, Some(key)) => Some(SourceSelector::Placeholder(key)),
            _ => None,
        }
    }

    /// Whether this segment needs an upload
    pub fn is_placeholder(&self) -> bool {
        matches!(self.selector(), Some(SourceSelector::Placeholder(_)))
    }
}

impl Template {
    /// Parse and validate a template from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let template: Template = serde_json::from_str(text)?;
        template.validate()?;
        Ok(template)
    }

    /// Read, parse and validate a template file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading template from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Pretty-printed JSON form of the template
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the load-time rules
    ///
    /// - the sequence is not empty
    /// - each segment sets exactly one of `fileUrl` / `placeholderKey`, non-empty
    /// - fades are finite and non-negative
    /// - a survey points inside the sequence and offers at least one option
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(invalid(format!("template '{}' has no segments", self.id)));
        }

        for (index, segment) in self.segments.iter().enumerate() {
            match segment.selector() {
                Some(SourceSelector::Fixed(url)) if url.trim().is_empty() => {
                    return Err(invalid(format!("segment {} has an empty fileUrl", index)));
                }
                Some(SourceSelector::Placeholder(key)) if key.trim().is_empty() => {
                    return Err(invalid(format!(
                        "segment {} has an empty placeholderKey",
                        index
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(invalid(format!(
                        "segment {} ('{}') must set exactly one of fileUrl or placeholderKey",
                        index, segment.label
                    )));
                }
            }

            if let Some(background) = &segment.background_music {
                if background.trim().is_empty() {
                    return Err(invalid(format!(
                        "segment {} has an empty backgroundMusic",
                        index
                    )));
                }
            }
        }

        for (name, value) in [("fadeIn", self.fade_in), ("fadeOut", self.fade_out)] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{} must be a non-negative number, got {}", name, value)));
            }
        }

        if let Some(survey) = &self.survey {
            if survey.after_index >= self.segments.len() {
                return Err(invalid(format!(
                    "survey afterIndex {} is outside the {} segments",
                    survey.after_index,
                    self.segments.len()
                )));
            }
            if survey.options.is_empty() {
                return Err(invalid("survey must offer at least one option".to_string()));
            }
        }

        Ok(())
    }

    /// Placeholder keys this template needs uploads for, in first-use order
    pub fn required_placeholders(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Some(SourceSelector::Placeholder(key)) = segment.selector() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Survey gated after `index`, if any
    pub fn survey_after(&self, index: usize) -> Option<&Survey> {
        self.survey.as_ref().filter(|s| s.after_index == index)
    }

    /// Index of the last segment
    pub fn last_index(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidTemplate(message)
}
