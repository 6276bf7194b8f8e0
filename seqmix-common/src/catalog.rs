//! Built-in template catalog
//!
//! The templates shipped with the authoring tool. Their sources are remote
//! sample URLs; callers rendering them locally bind uploads and point fixed
//! sources at local copies by editing an exported document.

use crate::template::{Segment, Template};
use crate::{Error, Result};

/// All built-in templates
pub fn builtin_templates() -> Vec<Template> {
    vec![podcast_template(), story_template()]
}

/// Look up a built-in template by id
pub fn find(id: &str) -> Result<Template> {
    builtin_templates()
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| Error::NotFound(format!("no built-in template with id '{}'", id)))
}

fn fixed(url: &str, label: &str) -> Segment {
    Segment {
        file_url: Some(url.to_string()),
        background_music: None,
        placeholder_key: None,
        label: label.to_string(),
        visual_content: None,
    }
}

fn upload(key: &str, background: Option<&str>, label: &str) -> Segment {
    Segment {
        file_url: None,
        background_music: background.map(str::to_string),
        placeholder_key: Some(key.to_string()),
        label: label.to_string(),
        visual_content: None,
    }
}

fn podcast_template() -> Template {
    Template {
        id: "podcast-template".to_string(),
        name: "Podcast Episode".to_string(),
        segments: vec![
            fixed(
                "https://audio-samples.github.io/samples/mp3/music/sample-4.mp3",
                "Standard Intro Jingle",
            ),
            upload(
                "main-content",
                Some("https://audio-samples.github.io/samples/mp3/music/sample-3.mp3"),
                "Main Episode Content",
            ),
            fixed(
                "https://audio-samples.github.io/samples/mp3/music/sample-2.mp3",
                "Standard Outro Jingle",
            ),
        ],
        fade_in: 2.0,
        fade_out: 3.0,
        survey: None,
    }
}

fn story_template() -> Template {
    const AMBIENT: &str = "https://audio-samples.github.io/samples/mp3/loop-ambient.mp3";

    Template {
        id: "story-template".to_string(),
        name: "Audio Story".to_string(),
        segments: vec![
            fixed(
                "https://audio-samples.github.io/samples/mp3/story-intro.mp3",
                "Story Opening Theme",
            ),
            upload("story-intro", Some(AMBIENT), "Story Introduction"),
            upload("main-story", Some(AMBIENT), "Main Story Content"),
            upload("story-conclusion", Some(AMBIENT), "Story Conclusion"),
            fixed(
                "https://audio-samples.github.io/samples/mp3/story-outro.mp3",
                "Story Closing Theme",
            ),
        ],
        fade_in: 1.5,
        fade_out: 2.0,
        survey: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_validate() {
        for template in builtin_templates() {
            template.validate().unwrap();
        }
    }

    #[test]
    fn test_find_by_id() {
        let podcast = find("podcast-template").unwrap();
        assert_eq!(podcast.name, "Podcast Episode");
        assert_eq!(podcast.required_placeholders(), vec!["main-content"]);

        let story = find("story-template").unwrap();
        assert_eq!(story.segments.len(), 5);
        assert_eq!(
            story.required_placeholders(),
            vec!["story-intro", "main-story", "story-conclusion"]
        );
        assert_eq!(story.fade_in, 1.5);
    }

    #[test]
    fn test_find_unknown() {
        assert!(matches!(find("nope"), Err(Error::NotFound(_))));
    }
}
