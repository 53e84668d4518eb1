//! Configuration management for idquery.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "idquery";

/// Environment variable prefix. Nested keys are separated by `__`,
/// e.g. `IDQUERY_LOOKUP__SIMILAR_LIMIT=10`.
const ENV_PREFIX: &str = "IDQUERY_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `IDQUERY_`)
/// 2. TOML config file at `~/.config/idquery/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data source configuration.
    pub data: DataConfig,
    /// Lookup configuration.
    pub lookup: LookupConfig,
    /// Background refresh configuration.
    pub refresh: RefreshConfig,
}

/// Where record dumps are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Explicit list of files to ingest. When non-empty, discovery is skipped.
    pub files: Vec<PathBuf>,
    /// Directories searched for part files, in order.
    pub search_dirs: Vec<PathBuf>,
    /// File name prefix of numbered part files (`<prefix><n>.txt`).
    pub part_prefix: String,
    /// Number of part files to look for, numbered from 1.
    pub part_count: u32,
    /// Regex matched against file names when no part file exists.
    pub fallback_pattern: String,
}

/// Lookup tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Maximum number of similar IDs returned on a miss.
    pub similar_limit: usize,
    /// Number of leading characters of the query used for prefix matching.
    pub prefix_len: usize,
    /// Number of IDs shown by `sample`.
    pub sample_size: usize,
}

/// Background refresh for long-running sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between re-ingestion passes. 0 disables refresh.
    pub interval_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            search_dirs: vec![PathBuf::from("."), Config::default_data_dir()],
            part_prefix: "data_part".to_string(),
            part_count: 5,
            fallback_pattern: r"(?i)^.*data.*\.txt$".to_string(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            similar_limit: 5,
            prefix_len: 5,
            sample_size: 8,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.data.part_prefix.is_empty() {
            return Err(Error::config_validation("part_prefix must not be empty"));
        }

        if self.data.part_count == 0 {
            return Err(Error::config_validation(
                "part_count must be greater than 0",
            ));
        }

        if self.lookup.similar_limit == 0 {
            return Err(Error::config_validation(
                "similar_limit must be greater than 0",
            ));
        }

        if self.lookup.prefix_len == 0 {
            return Err(Error::config_validation(
                "prefix_len must be greater than 0",
            ));
        }

        self.fallback_regex()?;

        Ok(())
    }

    /// Compile the discovery fallback pattern.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the pattern is not a valid regex.
    pub fn fallback_regex(&self) -> Result<Regex> {
        Regex::new(&self.data.fallback_pattern).map_err(|_| {
            Error::config_validation(format!(
                "invalid regex pattern: {}",
                self.data.fallback_pattern
            ))
        })
    }

    /// Get the refresh interval, or `None` when refresh is disabled.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh.interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh.interval_secs))
        }
    }

    /// Override the configured file list (e.g. from `--data` flags).
    ///
    /// An empty list leaves the configuration unchanged.
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        if !files.is_empty() {
            self.data.files = files;
        }
        self
    }
}
