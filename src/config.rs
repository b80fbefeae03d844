//! File configuration.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (explicit path; must exist)
//! 2. `~/.saddlery/config.toml` (user)
//! 3. `/etc/saddlery/config.toml` (system)
//! 4. built-in defaults
//!
//! The API bearer token is never read from the file. `api.token_env` names
//! the environment variable that holds it.
//!
//! ```toml
//! [api]
//! base_url = "https://shop.example.com"
//! timeout_secs = 15
//!
//! [cache]
//! default_ttl_secs = 300
//! max_entries = 10000
//!
//! [queue]
//! dependency_policy = "skip-and-continue"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 500
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cache::CacheConfig;
use crate::client::{RetryConfig, StorefrontClient};
use crate::optimizer::{DependencyPolicy, OptimizerConfig};
use crate::{Result, SaddleryError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL (default: http://localhost:5000).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Environment variable holding the bearer token
    /// (default: SADDLERY_API_TOKEN).
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            token_env: default_token_env(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_token_env() -> String {
    "SADDLERY_API_TOKEN".to_string()
}

impl ApiConfig {
    /// Bearer token from the configured environment variable, if set and
    /// non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Preload queue settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SaddleryError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            SaddleryError::Configuration(msg) => {
                SaddleryError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })?;
        debug!(?path, "loaded config");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            SaddleryError::Configuration(format!("Failed to parse config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(SaddleryError::Configuration(
                "api.base_url must not be empty".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(SaddleryError::Configuration(
                "cache.max_entries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the config file path, if any.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(SaddleryError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        let user = dirs::home_dir().map(|home| home.join(".saddlery").join("config.toml"));
        let system = PathBuf::from("/etc/saddlery/config.toml");

        Ok(user.into_iter().chain([system]).find(|p| p.exists()))
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig::new()
            .cache(self.cache.clone())
            .dependency_policy(self.queue.dependency_policy)
    }

    /// Build a client from the `[api]` and `[retry]` sections, attaching the
    /// bearer token when the environment provides one.
    pub fn client(&self) -> Result<StorefrontClient> {
        let client = StorefrontClient::with_timeout(
            &self.api.base_url,
            Duration::from_secs(self.api.timeout_secs),
        )?
        .with_retry(self.retry.clone());

        Ok(match self.api.token() {
            Some(token) => client.with_token(token),
            None => client,
        })
    }
}
