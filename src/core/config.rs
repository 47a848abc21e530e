// src/core/config.rs

//! The `config.toml` schema, its defaults and its validation.

use crate::constants::{
    CONFIG_FILENAME, DEFAULT_QUERY_LIMIT, DOWNLOAD_CAP_BYTES, MAX_DEFAULT_QUERY_LIMIT,
    MIN_DEFAULT_QUERY_LIMIT,
};
use crate::core::safety::SafetyState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or saving the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("Could not access config file '{path}': {source}")]
    Io {
        /// The config file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("Config file '{path}' is invalid: {source}")]
    Parse {
        /// The config file.
        path: String,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// The configuration could not be written as TOML.
    #[error("Failed to serialize to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// What happens to the rest of a line when an action inside a macro fails.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and run the next step.
    #[default]
    Continue,
    /// Abort the rest of the line.
    Stop,
}

impl FailurePolicy {
    /// The name used in the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Stop => "stop",
        }
    }
}

// --- CONFIG FILE MODELS ---

/// The contents of `config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CmcConfig {
    /// `[session]` table.
    pub session: SessionConfig,
    /// `[index]` table.
    pub index: IndexConfig,
    /// `[download]` table.
    pub download: DownloadConfig,
}

/// Startup values of the safety flags.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Skip confirmation prompts.
    pub batch: bool,
    /// Simulate destructive commands.
    pub dry_run: bool,
    /// Verify TLS certificates on download.
    pub ssl_verify: bool,
    /// What a failing macro step does to the rest of the line.
    pub macro_failure_policy: FailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let safety = SafetyState::default();
        Self {
            batch: safety.batch,
            dry_run: safety.dry_run,
            ssl_verify: safety.ssl_verify,
            macro_failure_policy: FailurePolicy::default(),
        }
    }
}

/// Path index settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    /// Roots scanned by `qbuild` when no roots are given.
    pub roots: Vec<PathBuf>,
    /// Result count for `qfind` without an explicit limit.
    pub default_limit: usize,
    /// Upper bound for an explicit limit.
    pub max_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            roots: dirs::home_dir().into_iter().collect(),
            default_limit: DEFAULT_QUERY_LIMIT,
            max_limit: 500,
        }
    }
}

/// Limits for `download`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Largest accepted body in bytes.
    pub max_bytes: u64,
    /// Whole-request timeout.
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DOWNLOAD_CAP_BYTES,
            timeout_secs: 30,
        }
    }
}

impl CmcConfig {
    /// The Safety State a new session starts with.
    pub fn initial_safety(&self) -> SafetyState {
        SafetyState {
            batch: self.session.batch,
            dry_run: self.session.dry_run,
            ssl_verify: self.session.ssl_verify,
        }
    }

    /// The default query limit, kept within 15..=50.
    pub fn default_query_limit(&self) -> usize {
        self.index
            .default_limit
            .clamp(MIN_DEFAULT_QUERY_LIMIT, MAX_DEFAULT_QUERY_LIMIT)
    }

    /// Clamps a user-supplied limit to `1..=max_limit`.
    pub fn clamp_query_limit(&self, requested: usize) -> usize {
        requested.clamp(1, self.index.max_limit.max(1))
    }
}

/// Loads `config.toml` from `config_dir`, writing the defaults first when the
/// file does not exist yet.
pub fn load_or_create(config_dir: &Path) -> Result<CmcConfig, ConfigError> {
    let config_path = config_dir.join(CONFIG_FILENAME);
    let io_error = |source| ConfigError::Io {
        path: config_path.display().to_string(),
        source,
    };

    if !config_path.exists() {
        let default_config = CmcConfig::default();
        let toml_string = toml::to_string_pretty(&default_config)?;
        fs::write(&config_path, toml_string).map_err(io_error)?;
        log::info!("Wrote default config to '{}'", config_path.display());
        return Ok(default_config);
    }

    let content = fs::read_to_string(&config_path).map_err(io_error)?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: config_path.display().to_string(),
        source,
    })
}
