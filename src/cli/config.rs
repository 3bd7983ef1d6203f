//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./memberlink.toml or ./.memberlink/config.toml
//! 2. User config: ~/.memberlink/config.toml
//! 3. System config: /etc/memberlink/config.toml
//! 4. Built-in defaults
//!
//! Whatever is loaded, `MEMBERLINK_API_URL` still overrides the base URL.

use crate::config::{ClientConfig, home_dir};
use crate::env;
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load configuration from `explicit` when given, otherwise discover it
    pub fn load(explicit: Option<&Path>) -> Result<ClientConfig> {
        let config = match explicit {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                ClientConfig::from_toml_file(path)?
            }
            None => Self::discover_config()?,
        };
        Ok(config.with_env_overrides())
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<ClientConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return ClientConfig::from_toml_file(config_path);
        }

        debug!("No configuration file found, using defaults");
        Ok(ClientConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = Self::get_config_candidates();

        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/memberlink").join(env::CONFIG_FILE_NAME));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("memberlink")
                    .join(env::CONFIG_FILE_NAME),
            );
        }

        candidates
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = home_dir().context("Could not determine home directory")?;
        Self::create_default_config_in(&home_dir)
    }

    fn create_default_config_in(home_dir: &Path) -> Result<PathBuf> {
        let config_dir = env::app_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).with_context(|| {
                format!("Failed to create configuration directory {:?}", config_dir)
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            ClientConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }
        if let Ok(url) = std_env::var(env::API_URL_ENV) {
            println!("API URL override ({}): {}", env::API_URL_ENV, url);
        }
    }
}
