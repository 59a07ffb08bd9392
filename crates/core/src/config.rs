//! TOML-based configuration for gbwf.
//!
//! Every field has a default, so a missing file is equivalent to an empty
//! one. Command-line flags are layered on top by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::merge::MergeStrategy;
use crate::source::Driver;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbwfConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Manifest source (`http://`, `https://` or `file://`). Without one,
    /// `init` offers only the vanilla base.
    #[serde(default)]
    pub manifest: Option<String>,

    #[serde(default)]
    pub vanilla: VanillaConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub merge: MergeConfig,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for GbwfConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            manifest: None,
            vanilla: VanillaConfig::default(),
            fetch: FetchConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Vanilla base
// ---------------------------------------------------------------------------

/// The base used when no manifest is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VanillaConfig {
    #[serde(default = "default_remote_name")]
    pub remote_name: String,

    #[serde(default = "default_vanilla_url")]
    pub url: String,

    #[serde(default = "default_ref", rename = "ref")]
    pub git_ref: String,
}

fn default_remote_name() -> String {
    "gbwf".into()
}
fn default_vanilla_url() -> String {
    "https://github.com/gbwf-dev/vanilla.git".into()
}
fn default_ref() -> String {
    "main".into()
}

impl Default for VanillaConfig {
    fn default() -> Self {
        Self {
            remote_name: default_remote_name(),
            url: default_vanilla_url(),
            git_ref: default_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Commits of history to fetch; 0 fetches everything.
    #[serde(default = "default_depth")]
    pub depth: u32,
}

fn default_depth() -> u32 {
    1
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// `ff-only`, `ff` or `ort`.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Overrides the HEAD branch name in conflict markers.
    #[serde(default)]
    pub ours_label: Option<String>,

    /// Overrides the incoming reference name in conflict markers.
    #[serde(default)]
    pub theirs_label: Option<String>,
}

fn default_strategy() -> String {
    "ff".into()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            ours_label: None,
            theirs_label: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl GbwfConfig {
    /// `<config dir>/gbwf/config.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gbwf").join("config.toml"))
    }

    /// Load from `path`; a file that does not exist yields the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        info!(path = %path.display(), "loading configuration");
        let contents = std::fs::read_to_string(path)?;
        let config: GbwfConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// none is given, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, after the repository has
    /// already been touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy()?;

        if let Some(manifest) = &self.manifest {
            Driver::extract(manifest).map_err(|e| ConfigError::InvalidValue {
                field: "manifest".into(),
                detail: e.to_string(),
            })?;
        }
        if self.vanilla.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "vanilla.url".into(),
                detail: "vanilla URL must not be empty".into(),
            });
        }
        if self.vanilla.remote_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "vanilla.remote_name".into(),
                detail: "remote name must not be empty".into(),
            });
        }

        Ok(())
    }

    /// The configured merge strategy.
    pub fn strategy(&self) -> Result<MergeStrategy, ConfigError> {
        self.merge
            .strategy
            .parse()
            .map_err(|e: crate::errors::MergeError| ConfigError::InvalidValue {
                field: "merge.strategy".into(),
                detail: e.to_string(),
            })
    }
}
