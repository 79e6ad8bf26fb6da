//! TOML file configuration structures.
//!
//! These structs directly map to the `stepwatch.toml` file format. Every
//! section and key is optional.

use serde::{Deserialize, Serialize};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub target: TargetConfig,
}

/// Event wait section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Upper bound on a single wait, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Lateness tolerated on top of `timeout_ms` before a timeout counts as
    /// overdue, in milliseconds.
    #[serde(default = "default_scheduling_slack_ms")]
    pub scheduling_slack_ms: u64,
    #[serde(default)]
    pub require_exactly_one: bool,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_scheduling_slack_ms() -> u64 {
    250
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            scheduling_slack_ms: default_scheduling_slack_ms(),
            require_exactly_one: false,
        }
    }
}

/// Target section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Buffer of the candidate event and command channels.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_channel_buffer() -> usize {
    256
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            channel_buffer: default_channel_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[wait]
timeout_ms = 1500
scheduling_slack_ms = 100
require_exactly_one = true

[target]
channel_buffer = 64
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.wait.timeout_ms, 1500);
        assert_eq!(config.wait.scheduling_slack_ms, 100);
        assert!(config.wait.require_exactly_one);
        assert_eq!(config.target.channel_buffer, 64);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: FileConfig = toml::from_str("[wait]\ntimeout_ms = 200\n").unwrap();
        assert_eq!(config.wait.timeout_ms, 200);
        assert_eq!(config.wait.scheduling_slack_ms, 250);
        assert!(!config.wait.require_exactly_one);
        assert_eq!(config.target.channel_buffer, 256);
    }

    #[test]
    fn test_unknown_value_type_is_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("[wait]\ntimeout_ms = \"soon\"\n");
        assert!(result.is_err());
    }
}
