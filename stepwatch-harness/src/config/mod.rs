//! Configuration module for stepwatch-harness.
//!
//! Handles loading configuration from an optional TOML file and CLI
//! arguments, and converting it into the runtime types the core uses.

pub mod file;

use crate::config::file::FileConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepwatch_sdk::config::{TargetConfig, WaitConfig};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Runtime settings for a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub wait: WaitConfig,
    pub target: TargetConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    wait_time_override: Option<Duration>,
}

impl ConfigLoader {
    /// Create a new config loader. Without a path, defaults are used.
    pub fn new(config_path: Option<impl AsRef<Path>>, wait_time_override: Option<Duration>) -> Self {
        Self {
            config_path: config_path.map(|p| p.as_ref().to_path_buf()),
            wait_time_override,
        }
    }

    /// Read the file (if any), apply CLI overrides, validate and convert.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut file_config = match &self.config_path {
            Some(path) => {
                let config_content = std::fs::read_to_string(path)?;
                toml::from_str(&config_content)?
            }
            None => FileConfig::default(),
        };

        if let Some(wait_time) = self.wait_time_override {
            file_config.wait.timeout_ms = u64::try_from(wait_time.as_millis()).map_err(|_| {
                ConfigError::ValidationError("wait time override out of range".to_string())
            })?;
        }

        validate(&file_config)?;
        Ok(build_settings(file_config))
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.wait.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "wait.timeout_ms must be positive".to_string(),
        ));
    }
    if config.target.channel_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "target.channel_buffer must be positive".to_string(),
        ));
    }
    Ok(())
}

fn build_settings(file_config: FileConfig) -> Settings {
    Settings {
        wait: WaitConfig {
            wait_time: Duration::from_millis(file_config.wait.timeout_ms),
            scheduling_slack: Duration::from_millis(file_config.wait.scheduling_slack_ms),
            require_exactly_one: file_config.wait.require_exactly_one,
        },
        target: TargetConfig {
            channel_buffer: file_config.target.channel_buffer,
        },
    }
}
