use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::LedgerSettings;
use crate::domain::UserId;
use crate::storage::Backend;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "excavator.toml";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger file (JSON document, or SQLite database for .db files)
    pub store_path: PathBuf,
    /// Overrides the backend inferred from `store_path`
    pub backend: Option<Backend>,
    /// Application log file, appended to
    pub log_path: Option<PathBuf>,
    pub command_prefix: String,
    /// Chat platform credential; only carried for the transport
    pub bot_token: Option<String>,
    /// The bot's own user id, never a valid lending subject
    pub bot_id: UserId,
    pub status_length: usize,
    pub resource_name: String,
    pub persistence_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let settings = LedgerSettings::default();
        Self {
            store_path: PathBuf::from("excavator.json"),
            backend: None,
            log_path: None,
            command_prefix: "!".to_string(),
            bot_token: None,
            bot_id: 0,
            status_length: settings.status_length,
            resource_name: settings.resource_name,
            persistence_timeout_secs: settings.persistence_timeout.as_secs(),
        }
    }
}

impl Config {
    /// Load an explicit config file, or `excavator.toml` if present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML, replacing `${VAR}` with environment variables first.
    /// Unknown variables are left as written.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let processed = ENV_VAR.replace_all(content, |caps: &regex::Captures| {
            let name = &caps[1];
            std::env::var(name).unwrap_or_else(|_| format!("${{{}}}", name))
        });
        Ok(toml::from_str(&processed)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_prefix.trim().is_empty() {
            return Err(invalid("command_prefix", "must not be empty"));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(invalid("store_path", "must not be empty"));
        }
        if self.status_length == 0 {
            return Err(invalid("status_length", "must be at least 1"));
        }
        if self.persistence_timeout_secs == 0 {
            return Err(invalid("persistence_timeout_secs", "must be at least 1"));
        }
        if self.resource_name.trim().is_empty() {
            return Err(invalid("resource_name", "must not be empty"));
        }
        Ok(())
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            resource_name: self.resource_name.clone(),
            status_length: self.status_length,
            persistence_timeout: Duration::from_secs(self.persistence_timeout_secs),
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
