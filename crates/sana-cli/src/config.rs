//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use sana_chat::{ChatConfig, RetryPolicy};

/// Configuration for sana
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the classification backend
    pub endpoint: Option<String>,
    /// Free-tier message ceiling
    pub free_message_limit: Option<u32>,
    /// Minimum confidence before an assessment is surfaced as final
    pub confidence_threshold: Option<u8>,
    /// Maximum classification attempts per turn
    pub retry_max_attempts: Option<u32>,
    /// Delay between retries, in milliseconds
    pub retry_delay_ms: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sana")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for SANA_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("SANA_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            endpoint: Some("http://localhost:3000".to_string()),
            free_message_limit: None,
            confidence_threshold: None,
            retry_max_attempts: None,
            retry_delay_ms: None,
        };

        default_config.save()?;
        Ok(path)
    }

    /// Fold the optional file settings over the controller defaults.
    pub fn chat_config(&self) -> ChatConfig {
        let defaults = ChatConfig::default();
        let retry_defaults = RetryPolicy::default();
        ChatConfig {
            free_message_limit: self.free_message_limit.unwrap_or(defaults.free_message_limit),
            confidence_threshold: self
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            retry: RetryPolicy {
                max_attempts: self
                    .retry_max_attempts
                    .unwrap_or(retry_defaults.max_attempts),
                delay: self
                    .retry_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(retry_defaults.delay),
            },
            ..defaults
        }
    }
}

/// Example config content shown after --init-config
pub fn example_config() -> &'static str {
    r#"# sana configuration
endpoint = "http://localhost:3000"
# free_message_limit = 15
# confidence_threshold = 90
# retry_max_attempts = 3
# retry_delay_ms = 1500
"#
}
