//! Integration tests for config file resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SEQMIX_CONFIG are marked with #[serial].

use seqmix_common::config::{SampleRatePolicy, SeqmixConfig, CONFIG_ENV_VAR};
use seqmix_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    let from_env = write_config("[live]\nlog_capacity = 7\n");
    let from_cli = write_config("[live]\nlog_capacity = 42\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let config = SeqmixConfig::resolve(Some(from_cli.path())).unwrap();
    assert_eq!(config.live.log_capacity, 42);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_used_without_cli_argument() {
    let from_env = write_config("[mix]\nsample_rate_policy = \"reject\"\nbackground_gain = 0.5\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let config = SeqmixConfig::resolve(None).unwrap();
    assert_eq!(config.mix.sample_rate_policy, SampleRatePolicy::Reject);
    assert_eq!(config.mix.background_gain, 0.5);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_named_file_must_exist() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = SeqmixConfig::resolve(Some(&missing)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_sources_asset_root() {
    let file = write_config("[sources]\nasset_root = \"/srv/audio\"\n");
    let config = SeqmixConfig::load(file.path()).unwrap();
    assert_eq!(config.sources.asset_root, std::path::PathBuf::from("/srv/audio"));
}
