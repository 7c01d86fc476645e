//! Configuration
//!
//! Loaded from TOML; every section and field has a default so a partial
//! file is enough.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `backend.api_key`
pub const API_KEY_ENV: &str = "AIDFLOW_API_KEY";

const MAX_WINDOW_HOURS: u64 = 100 * 365 * 24;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AidflowConfig {
    /// Allocation rules
    pub workflow: WorkflowConfig,
    /// Hosted backend connection
    pub backend: BackendConfig,
    /// Goods name cache sizing
    pub catalog: CatalogConfig,
}

impl AidflowConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `AIDFLOW_API_KEY` when set and non-empty
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.backend.api_key = Some(key);
            }
        }
        self
    }

    /// Check ranges and the backend URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workflow.recency_window_hours == 0 {
            return Err(ConfigError::Invalid {
                field: "workflow.recency_window_hours",
                reason: "must be greater than zero".to_string(),
            });
        }
        url::Url::parse(&self.backend.url).map_err(|e| ConfigError::Invalid {
            field: "backend.url",
            reason: e.to_string(),
        })?;
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "backend.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Allocation workflow settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Lookback during which a prior allocation blocks a new one
    pub recency_window_hours: u64,
}

impl WorkflowConfig {
    /// Defaults: a 720 hour window
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the recency window
    #[inline]
    #[must_use]
    pub fn with_recency_window_hours(mut self, hours: u64) -> Self {
        self.recency_window_hours = hours;
        self
    }

    /// Window as a duration, capped at a century
    #[must_use]
    pub fn recency_window(&self) -> chrono::Duration {
        let hours = self.recency_window_hours.min(MAX_WINDOW_HOURS);
        chrono::Duration::hours(i64::try_from(hours).unwrap_or(0))
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            recency_window_hours: 30 * 24,
        }
    }
}

/// Hosted backend connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL; the REST gateway lives under `rest/v1/`
    pub url: String,
    /// Project API key, sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Database schema exposed by the REST gateway
    pub schema: String,
}

impl BackendConfig {
    /// Per-request timeout as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: None,
            timeout_secs: 15,
            schema: "public".to_string(),
        }
    }
}

/// Goods catalog sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Most names kept at once
    pub max_capacity: u64,
    /// Seconds before a cached name is reloaded
    pub ttl_secs: u64,
}

impl CatalogConfig {
    /// Catalog sized from these settings
    #[must_use]
    pub fn build(&self) -> crate::catalog::GoodsCatalog {
        crate::catalog::GoodsCatalog::with_ttl(self.max_capacity, Duration::from_secs(self.ttl_secs))
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl_secs: 3_600,
        }
    }
}
