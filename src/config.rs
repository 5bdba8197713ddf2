//! Viewer configuration.
//!
//! Loaded from a single `config.toml`. Every key is optional; a missing file
//! means stock defaults.
//!
//! ## Config File Location
//!
//! `--config FILE` on the command line, otherwise the user config directory:
//!
//! ```text
//! ~/.config/texview/config.toml     (Linux)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # cache_dir = "/path"   # Thumbnail cache (omit for <user cache dir>/texview/thumbnails)
//!
//! [thumbnails]
//! width = 256             # Thumbnail width in pixels
//! height = 144            # Thumbnail height in pixels
//!
//! [processing]
//! # logical_cores = 8     # Core count used to size the worker limit (omit for auto)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Thumbnail cache directory. `None` uses the per-user cache directory.
    pub cache_dir: Option<PathBuf>,
    pub thumbnails: ThumbnailsConfig,
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.width == 0 || self.thumbnails.height == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.width and thumbnails.height must be non-zero".into(),
            ));
        }
        if self.processing.logical_cores == Some(0) {
            return Err(ConfigError::Validation(
                "processing.logical_cores must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Thumbnail size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailsConfig {
    /// `(width, height)`.
    pub fn target(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 144,
        }
    }
}

/// Worker sizing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Logical core count to size the thumbnail worker limit from.
    /// When absent, the detected count is used.
    pub logical_cores: Option<usize>,
}

/// Resolve the logical core count from config.
///
/// - `None` → detected cores (at least 1)
/// - `Some(n)` → `n`, so a machine can be made to behave like another
pub fn logical_cores(config: &ProcessingConfig) -> usize {
    config.logical_cores.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

/// Where the config file lives when none is given on the command line.
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("texview").join("config.toml"))
}

/// The thumbnail cache directory: the configured one, else
/// `<user cache dir>/texview/thumbnails`.
pub fn resolve_cache_dir(config: &Config) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = &config.cache_dir {
        return Ok(dir.clone());
    }
    dirs_next::cache_dir()
        .or_else(dirs_next::home_dir)
        .map(|base| base.join("texview").join("thumbnails"))
        .ok_or_else(|| {
            ConfigError::Validation("no user cache directory; set cache_dir".into())
        })
}

/// Load config from `path`.
///
/// Returns stock defaults if the file does not exist. Rejects unknown keys
/// and validates the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# texview Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Thumbnail cache directory. Entries are never evicted; delete the
# directory to reclaim space.
# Default: <user cache dir>/texview/thumbnails
# cache_dir = "/path/to/cache"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Thumbnail size in pixels. Images are scaled to fit and centred;
# leftover space is transparent. Changing the size starts a fresh
# set of cache entries.
width = 256
height = 144

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Logical core count used to size the background worker limit,
# which is max(cores - 2, 2). Omit to detect.
# logical_cores = 8
"##
}
