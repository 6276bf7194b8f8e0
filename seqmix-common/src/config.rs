//! Configuration loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SEQMIX_CONFIG`)
//! 3. Platform config directory (`<config_dir>/seqmix/config.toml`)
//! 4. Built-in defaults (fallback)
//!
//! Every field has a default, so a partial file only overrides what it names.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "SEQMIX_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeqmixConfig {
    pub mix: MixConfig,
    pub live: LiveConfig,
    pub sources: SourcesConfig,
}

/// Offline mix settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Relative gain of looped background under a segment
    pub background_gain: f32,

    /// What to do when assets do not share the target sample rate
    pub sample_rate_policy: SampleRatePolicy,
}

/// Sample-rate conformance policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRatePolicy {
    /// Convert mismatched assets to the target rate
    Resample,
    /// Fail the composition
    Reject,
}

/// Live playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Delay before auto-advancing past a segment whose audio is missing
    pub missing_asset_delay_ms: u64,

    /// Diagnostic log entries kept in memory
    pub log_capacity: usize,

    /// Event bus channel capacity
    pub event_capacity: usize,

    /// Sample rate of the software output graph
    pub output_sample_rate: u32,
}

/// Source lookup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Base directory for relative source paths
    pub asset_root: PathBuf,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            background_gain: 0.3,
            sample_rate_policy: SampleRatePolicy::Resample,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            missing_asset_delay_ms: 100,
            log_capacity: 100,
            event_capacity: 256,
            output_sample_rate: 44100,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
        }
    }
}

impl SeqmixConfig {
    /// Parse and validate config TOML
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: SeqmixConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve the config file by priority and load it, or fall back to defaults
    ///
    /// An explicitly named file (argument or environment) must exist; the
    /// platform default location is optional.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_arg {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Self::load(Path::new(&path));
            }
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        debug!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let gain = self.mix.background_gain;
        if !gain.is_finite() || !(0.0..=1.0).contains(&gain) {
            return Err(Error::Config(format!(
                "mix.background_gain must be within [0, 1], got {}",
                gain
            )));
        }
        if self.live.log_capacity == 0 {
            return Err(Error::Config("live.log_capacity must be > 0".to_string()));
        }
        if self.live.event_capacity == 0 {
            return Err(Error::Config("live.event_capacity must be > 0".to_string()));
        }
        if self.live.output_sample_rate == 0 {
            return Err(Error::Config("live.output_sample_rate must be > 0".to_string()));
        }
        Ok(())
    }

    /// Missing-asset auto-advance delay in seconds
    pub fn missing_asset_delay_secs(&self) -> f64 {
        self.live.missing_asset_delay_ms as f64 / 1000.0
    }
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("seqmix").join("config.toml"))
}
