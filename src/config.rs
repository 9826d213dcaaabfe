//! # Configuration Management
//!
//! Loads bridge settings from a TOML file: the PWSWeather station and
//! account credentials, the submission interval, and the Signal K server to
//! read from. Email and password are required; starting without them is a
//! fatal configuration error and no tasks are armed.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("email and password are required")]
    MissingCredentials,
}

/// Bridge configuration loaded from pws-bridge.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// PWSWeather station and account settings
    pub station: StationConfig,
    /// Signal K host settings
    #[serde(default)]
    pub host: HostConfig,
}

/// PWSWeather station and account configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// Station ID as registered on PWSWeather.com (e.g. "KMEPORTL1")
    pub id: String,
    /// PWSWeather.com account email
    pub email: String,
    /// PWSWeather.com account password
    pub password: String,
    /// Minutes between report submissions
    #[serde(default = "default_submit_interval")]
    pub submit_interval_minutes: u64,
}

/// Signal K server to read sensor data from
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Base URL of the Signal K server REST API
    pub url: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            url: "http://localhost:3000".to_string(),
        }
    }
}

fn default_submit_interval() -> u64 {
    5
}

impl Config {
    /// Load configuration from pws-bridge.toml in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("pws-bridge.toml")
    }

    /// Load configuration from the specified path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        if config.station.email.is_empty() || config.station.password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(config)
    }
}
