//! Configuration management for the compare service
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every section is optional; a missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::compare::{DEFAULT_ECHO_WINDOW_MS, DEFAULT_STORAGE_KEY};

/// Default API port
pub const DEFAULT_API_PORT: u16 = 8130;

/// Longest accepted echo window
const MAX_ECHO_WINDOW_MS: u64 = 60_000;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub compare: CompareConfig,
}

/// Durable storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Key holding the compare list
    #[serde(default = "default_storage_key")]
    pub key: String,
    /// Byte quota, memory backend only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<usize>,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Memory,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Compare store tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompareConfig {
    #[serde(default = "default_echo_window_ms")]
    pub echo_window_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            key: default_storage_key(),
            quota_bytes: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_api_port(),
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            echo_window_ms: default_echo_window_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration; a missing file is created with the defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            return Self::load(path).await;
        }

        let config = Self::default();
        match config.save(path).await {
            Ok(()) => info!("No config file found, wrote defaults to {}", path.display()),
            Err(e) => warn!("No config file found, using defaults: {:#}", e),
        }
        Ok(config)
    }

    /// Parse and validate YAML contents
    pub fn parse(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.storage.key.trim().is_empty() {
            anyhow::bail!("storage.key cannot be empty");
        }

        if self.storage.quota_bytes.is_some() && self.storage.backend != StorageBackend::Memory {
            anyhow::bail!("storage.quota_bytes is only supported by the memory backend");
        }

        if self.api.enabled && self.api.port == 0 {
            anyhow::bail!("api.port cannot be 0");
        }

        if self.compare.echo_window_ms > MAX_ECHO_WINDOW_MS {
            anyhow::bail!(
                "compare.echo_window_ms is {} (must be at most {})",
                self.compare.echo_window_ms,
                MAX_ECHO_WINDOW_MS
            );
        }

        Ok(())
    }
}

// Default value functions
fn default_backend() -> StorageBackend { StorageBackend::Sled }
fn default_storage_key() -> String { DEFAULT_STORAGE_KEY.to_string() }
fn default_true() -> bool { true }
fn default_api_port() -> u16 { DEFAULT_API_PORT }
fn default_echo_window_ms() -> u64 { DEFAULT_ECHO_WINDOW_MS }
