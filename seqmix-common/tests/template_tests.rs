//! Integration tests for template documents on disk

use seqmix_common::catalog;
use seqmix_common::{Error, Template, UploadBinding, UploadSet};
use std::io::Write;

#[test]
fn test_load_exported_builtin_round_trip() {
    let story = catalog::find("story-template").unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(story.to_pretty_json().unwrap().as_bytes()).unwrap();

    let loaded = Template::load(file.path()).unwrap();
    assert_eq!(loaded, story);
}

#[test]
fn test_load_invalid_document_reports_reason() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"{"id":"t","name":"t","fadeIn":1,"fadeOut":1,
            "audioSequence":[{"label":"no source"}]}"#,
    )
    .unwrap();

    match Template::load(file.path()) {
        Err(Error::InvalidTemplate(reason)) => assert!(reason.contains("segment 0")),
        other => panic!("expected InvalidTemplate, got {:?}", other),
    }
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Template::load(&dir.path().join("nope.json"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_podcast_readiness() {
    let podcast = catalog::find("podcast-template").unwrap();
    let mut uploads = UploadSet::new();
    assert_eq!(uploads.missing_for(&podcast), vec!["main-content"]);

    uploads.bind(UploadBinding::new("main-content", "episode.wav"));
    assert!(uploads.missing_for(&podcast).is_empty());
}
