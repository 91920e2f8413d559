//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API location, the session storage backend, how a
//! persisted session is verified at startup, and the last used email.
//!
//! Configuration is stored at `~/.config/userdesk/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_BASE_URL;
use crate::api::ApiClient;
use crate::auth::{PresenceVerifier, RemoteVerifier, Verifier};
use crate::store::{DurableStore, FileStore, KeyringStore};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "userdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "USERDESK_API_URL";

/// Where the session is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

/// How a persisted credential is checked at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Both keys present is enough
    #[default]
    Presence,
    /// Ask the server who the token belongs to
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage: StorageBackend,
    pub verification: VerificationMode,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            verification: VerificationMode::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env();
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Build the configured session storage backend
    pub fn durable_store(&self, cache_dir: PathBuf) -> Box<dyn DurableStore> {
        match self.storage {
            StorageBackend::File => Box::new(FileStore::new(cache_dir)),
            StorageBackend::Keyring => Box::new(KeyringStore::new()),
        }
    }

    /// Build the configured startup verifier
    pub fn verifier(&self, api: &ApiClient) -> Box<dyn Verifier> {
        match self.verification {
            VerificationMode::Presence => Box::new(PresenceVerifier),
            VerificationMode::Remote => Box::new(RemoteVerifier::new(api.clone())),
        }
    }
}
