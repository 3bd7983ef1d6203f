//! Client configuration.
//!
//! All sections have defaults, so a configuration file only needs to name
//! the values it changes:
//!
//! ```toml
//! log_filter = "memberlink=debug"
//!
//! [api]
//! base_url = "https://gym.example.com"
//! timeout_secs = 15
//!
//! [notifications]
//! enabled = true
//! ```

use crate::env;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration for the member client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    pub log_filter: String,
}

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Durable storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the key-value store. Defaults to `~/.memberlink`.
    pub data_dir: Option<PathBuf>,
}

/// Push notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Project identifier handed to the platform when issuing tokens
    pub project_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            notifications: NotificationConfig::default(),
            log_filter: env::DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: env::api::DEFAULT_BASE_URL.to_string(),
            timeout_secs: env::api::DEFAULT_TIMEOUT_SECS,
            user_agent: env::api::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_id: None,
        }
    }
}

impl ClientConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save to TOML file, creating the parent directory when needed
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Apply environment overrides on top of file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(env::API_URL_ENV)
            && !url.trim().is_empty()
        {
            debug!("Overriding API base URL from {}", env::API_URL_ENV);
            self.api.base_url = url.trim().to_string();
        }
        self
    }

    /// Directory for the durable store, falling back to the home directory
    /// and finally to the current directory
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.data_dir {
            return dir.clone();
        }
        match home_dir() {
            Some(home) => env::user_data_dir_path(&home),
            None => env::app_dir_path(Path::new(".")),
        }
    }
}

/// Get home directory path
pub(crate) fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://gym.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://gym.example.com");
        assert_eq!(config.api.timeout_secs, env::api::DEFAULT_TIMEOUT_SECS);
        assert!(config.notifications.enabled);
        assert_eq!(config.log_filter, env::DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = ClientConfig::default();
        original.storage.data_dir = Some(temp_dir.path().join("data"));
        original.notifications.project_id = Some("proj-1".to_string());

        original.to_toml_file(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = ClientConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let mut config = ClientConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/var/lib/memberlink"));
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/memberlink"));
    }

    #[test]
    #[serial]
    fn test_env_override_base_url() {
        unsafe { std::env::set_var(env::API_URL_ENV, "https://override.example.com") };
        let config = ClientConfig::default().with_env_overrides();
        unsafe { std::env::remove_var(env::API_URL_ENV) };

        assert_eq!(config.api.base_url, "https://override.example.com");
    }

    #[test]
    #[serial]
    fn test_blank_env_override_is_ignored() {
        unsafe { std::env::set_var(env::API_URL_ENV, "  ") };
        let config = ClientConfig::default().with_env_overrides();
        unsafe { std::env::remove_var(env::API_URL_ENV) };

        assert_eq!(config.api.base_url, env::api::DEFAULT_BASE_URL);
    }
}
