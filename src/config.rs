use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::tree::MAX_NESTING;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_nesting: usize,
    pub history: HistoryConfig,
    pub delays: DelayConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_nesting: MAX_NESTING,
            history: HistoryConfig::default(),
            delays: DelayConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_size: usize,
    pub debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            debounce_ms: 500,
        }
    }
}

impl HistoryConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Named settling delays used to order deferred work after structural edits.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub next_frame_ms: u64,
    pub short_ms: u64,
    pub medium_ms: u64,
    pub long_ms: u64,
    pub settle_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            next_frame_ms: 16,
            short_ms: 10,
            medium_ms: 50,
            long_ms: 80,
            settle_ms: 150,
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: EditorConfig = toml::from_str(content)?;
        config.max_nesting = config.max_nesting.clamp(1, MAX_NESTING);
        config.history.max_size = config.history.max_size.max(1);
        Ok(config)
    }

    /// Loads the file at `config_path`; a missing file yields `Ok(None)`.
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config =
            Self::from_toml_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;
        Ok(Some(config))
    }

    /// `$XDG_CONFIG_HOME/quire/config.toml`, falling back to `~/.config`.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("quire").join("config.toml"))
    }
}
