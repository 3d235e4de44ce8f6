//! Store configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::engine::DEFAULT_PAGE_SIZE;

pub const ENV_TARGET: &str = "REFERRAL_STORE_TARGET";
pub const ENV_CREDENTIALS: &str = "REFERRAL_STORE_CREDENTIALS";
pub const ENV_PAGE_SIZE: &str = "REFERRAL_STORE_PAGE_SIZE";

/// Configuration errors. Always fatal; retrying cannot fix them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Store configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Identifier of the workbook holding every sheet.
    pub target: String,
    /// Credentials handed to the backing service client, if it needs any.
    pub credentials: Option<String>,
    /// Page size for list calls that leave the limit unset.
    pub default_page_size: usize,
    /// Attempts the random identifier scheme makes before giving up.
    pub random_id_attempts: usize,
    /// Bold and freeze header rows after writing them.
    pub format_headers: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            credentials: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            random_id_attempts: 20,
            format_headers: true,
        }
    }
}

impl StoreConfig {
    /// Create a configuration for the given target.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn credentials(mut self, value: impl Into<String>) -> Self {
        self.credentials = Some(value.into());
        self
    }

    pub fn default_page_size(mut self, value: usize) -> Self {
        self.default_page_size = value;
        self
    }

    pub fn random_id_attempts(mut self, value: usize) -> Self {
        self.random_id_attempts = value;
        self
    }

    pub fn format_headers(mut self, value: bool) -> Self {
        self.format_headers = value;
        self
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let target = lookup(ENV_TARGET)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_TARGET))?;

        let mut config = Self::new(target.trim());
        config.credentials = lookup(ENV_CREDENTIALS).filter(|v| !v.trim().is_empty());
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            config.default_page_size = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PAGE_SIZE,
                value: raw.clone(),
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file; unset keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::Missing("target"));
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "default_page_size",
                value: "0".to_string(),
            });
        }
        if self.random_id_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "random_id_attempts",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
