//! binwatch configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::monitor::MonitorConfig;

/// Main binwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat transport configuration
    pub telegram: TelegramConfig,

    /// Remote authentication / registration service
    pub services: ServicesConfig,

    /// Sensor channel configuration
    pub thingspeak: ThingSpeakConfig,

    /// Periodic monitor loop
    pub monitor: MonitorConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.telegram.token_env).is_err() {
            return Err(eyre::eyre!(
                "Bot token not found. Set the {} environment variable.",
                self.telegram.token_env
            ));
        }
        if self.monitor.alert_frequency == 0 {
            return Err(eyre::eyre!("monitor.alert_frequency must be a positive integer"));
        }
        if self.thingspeak.bin_tags.is_empty() {
            return Err(eyre::eyre!("thingspeak.bin-tags must name at least one sensor"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .binwatch.yml
        let local_config = PathBuf::from(".binwatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/binwatch/binwatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("binwatch").join("binwatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Chat transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Environment variable containing the bot token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Bot API base URL
    #[serde(rename = "api-base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: "BINWATCH_BOT_TOKEN".to_string(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl TelegramConfig {
    /// Read the bot token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env)
            .context(format!("Bot token environment variable {} not set", self.token_env))
    }
}

/// Remote authentication / registration service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Base URL of the credential service
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Real-time dashboard link offered behind the URL button
    #[serde(rename = "dashboard-url")]
    pub dashboard_url: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            dashboard_url: "https://thingspeak.com/channels/2622766".to_string(),
        }
    }
}

/// Sensor channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThingSpeakConfig {
    /// ThingSpeak API base URL
    #[serde(rename = "api-base")]
    pub api_base: String,

    /// Channel holding one field per bin sensor
    #[serde(rename = "channel-id")]
    pub channel_id: u64,

    /// Environment variable with the channel read key (optional for public channels)
    #[serde(rename = "read-key-env")]
    pub read_key_env: String,

    /// Environment variable with the channel write key
    #[serde(rename = "write-key-env")]
    pub write_key_env: String,

    /// Display tag per channel field, in field order
    #[serde(rename = "bin-tags")]
    pub bin_tags: Vec<String>,

    /// Directory for rendered graph artifacts
    #[serde(rename = "artifact-dir")]
    pub artifact_dir: PathBuf,
}

impl Default for ThingSpeakConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.thingspeak.com".to_string(),
            channel_id: 2622766,
            read_key_env: "THINGSPEAK_READ_KEY".to_string(),
            write_key_env: "THINGSPEAK_WRITE_KEY".to_string(),
            bin_tags: vec!["Bin-1".to_string(), "Bin-2".to_string(), "Bin-3".to_string()],
            artifact_dir: PathBuf::from("."),
        }
    }
}

impl ThingSpeakConfig {
    /// Channel read key; empty if the environment variable is unset
    pub fn read_key(&self) -> String {
        std::env::var(&self.read_key_env).unwrap_or_default()
    }

    /// Channel write key; empty if the environment variable is unset
    pub fn write_key(&self) -> String {
        std::env::var(&self.write_key_env).unwrap_or_default()
    }
}
