//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the notes service URL, the credential storage backend,
//! and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/penstroke/config.json`. The
//! `PENSTROKE_API_BASE_URL` and `PENSTROKE_STORAGE` environment variables
//! override the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::store::{CredentialStore, FileStore, KeyringStore, MemoryStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "penstroke";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Notes service used when nothing else is configured
const DEFAULT_API_BASE_URL: &str = "http://localhost:8085";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const API_BASE_URL_ENV: &str = "PENSTROKE_API_BASE_URL";
pub const STORAGE_ENV: &str = "PENSTROKE_STORAGE";

/// Where session credentials are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Process memory only; signed out on exit
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage: StorageBackend,
    pub request_timeout_secs: u64,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_BASE_URL_ENV).filter(|u| !u.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(storage) = lookup(STORAGE_ENV) {
            match storage.parse() {
                Ok(backend) => self.storage = backend,
                Err(e) => tracing::warn!(error = %e, "Ignoring {}", STORAGE_ENV),
            }
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("API base URL must be an http(s) URL: {}", self.api_base_url);
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Open the configured credential store
    pub fn open_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.storage {
            StorageBackend::File => Arc::new(FileStore::open(&Self::data_dir()?)?),
            StorageBackend::Keyring => Arc::new(KeyringStore::new()),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}
