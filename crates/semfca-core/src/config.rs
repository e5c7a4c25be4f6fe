//! Application configuration management.
//!
//! Persistent settings (last identifier, preferred credential source, API
//! base URL) live at `~/.config/semfca/config.json`. Environment variables
//! override them for the current process; secrets are only ever read from the
//! environment and never written back.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application name used for the config directory
const APP_NAME: &str = "semfca";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8787";

/// HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const API_URL_VAR: &str = "SEMFCA_API_URL";
pub const TIMEOUT_VAR: &str = "SEMFCA_TIMEOUT_SECS";
pub const CREDENTIALS_VAR: &str = "SEMFCA_CREDENTIALS";
pub const PASSPHRASE_VAR: &str = "SEMFCA_SESSION_PASSPHRASE";
pub const LOG_DIR_VAR: &str = "SEMFCA_LOG_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("Failed to access config file")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where login credentials come from when no session artifact exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    #[default]
    Env,
    Keyring,
    Prompt,
}

impl FromStr for CredentialSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(CredentialSource::Env),
            "keyring" | "keychain" => Ok(CredentialSource::Keyring),
            "prompt" => Ok(CredentialSource::Prompt),
            _ => Err(ConfigError::InvalidValue {
                key: CREDENTIALS_VAR,
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_source: Option<CredentialSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    #[serde(skip)]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip)]
    pub session_passphrase: Option<String>,
    #[serde(skip)]
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(API_URL_VAR) {
            self.api_base_url = Some(url);
        }
        if let Some(raw) = var(TIMEOUT_VAR) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: TIMEOUT_VAR,
                    value: raw.clone(),
                })?;
            self.request_timeout_secs = Some(secs);
        }
        if let Some(raw) = var(CREDENTIALS_VAR) {
            self.credential_source = Some(raw.parse()?);
        }
        if let Some(passphrase) = var(PASSPHRASE_VAR) {
            self.session_passphrase = Some(passphrase);
        }
        if let Some(dir) = var(LOG_DIR_VAR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn credential_source(&self) -> CredentialSource {
        self.credential_source.unwrap_or_default()
    }
}
