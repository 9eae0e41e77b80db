//! HyreLog Configuration Module
//!
//! Client configuration with explicit defaults for every recognised option.
//! The CLI reads `~/.config/hyrelog/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Explicit builder calls / CLI flags
//! 2. Environment variables (`HYRELOG_API_KEY`, `HYRELOG_BASE_URL`, `HYRELOG_DEBUG`, `HYRELOG_TIMEOUT`)
//! 3. Config file
//! 4. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::BatchOptions;
use crate::error::{HyreLogError, Result};
use crate::transport::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.hyrelog.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_KEY: &str = "HYRELOG_API_KEY";
pub const ENV_BASE_URL: &str = "HYRELOG_BASE_URL";
pub const ENV_DEBUG: &str = "HYRELOG_DEBUG";
pub const ENV_TIMEOUT: &str = "HYRELOG_TIMEOUT";

/// Serde helpers for durations written as (fractional) seconds.
pub mod seconds {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            D::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {}",
                secs
            ))
        })
    }
}

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Workspace or company key, sent as `x-hyrelog-key`
    pub api_key: String,

    /// API root; paths are appended verbatim
    pub base_url: String,

    /// Verbose request/response logging
    pub debug: bool,

    /// Per-request timeout
    #[serde(with = "seconds")]
    pub timeout: Duration,

    pub retry: RetryConfig,

    pub batch: BatchOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            debug: false,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            batch: BatchOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch(mut self, batch: BatchOptions) -> Self {
        self.batch = batch;
        self
    }

    /// Get the config directory path
    ///
    /// Returns `~/.config/hyrelog/` on Unix, `%APPDATA%/hyrelog/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hyrelog")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from a TOML file
    ///
    /// Returns defaults if the file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            HyreLogError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            HyreLogError::config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Build from environment variables only (`HYRELOG_API_KEY` required).
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(key) = non_empty_env(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(url) = non_empty_env(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(debug) = non_empty_env(ENV_DEBUG) {
            self.debug = matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(timeout) = non_empty_env(ENV_TIMEOUT) {
            let secs: f64 = timeout.parse().map_err(|_| {
                HyreLogError::config(format!("{} must be seconds, got '{}'", ENV_TIMEOUT, timeout))
            })?;
            self.timeout = Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    HyreLogError::config(format!(
                        "{} must be a positive number of seconds, got '{}'",
                        ENV_TIMEOUT, timeout
                    ))
                })?;
        }
        Ok(self)
    }

    /// Check every option before a client is built.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(HyreLogError::config(format!(
                "API key is required (set {})",
                ENV_API_KEY
            )));
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| {
            HyreLogError::config(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HyreLogError::config(format!(
                "Base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.timeout.is_zero() {
            return Err(HyreLogError::config("timeout must be greater than zero"));
        }

        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(HyreLogError::config(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(HyreLogError::config(
                "retry.initial_delay must not exceed retry.max_delay",
            ));
        }

        self.batch.validate()
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// API key safe for display
    pub fn masked_key(&self) -> String {
        mask_api_key(&self.api_key)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Mask API key for display
///
/// Shows first 8 characters followed by "..." for keys longer than 8 chars.
/// Returns "***" for shorter keys.
pub fn mask_api_key(key: &str) -> String {
    if key.chars().count() > 8 {
        let prefix: String = key.chars().take(8).collect();
        format!("{}...", prefix)
    } else {
        "***".to_string()
    }
}
