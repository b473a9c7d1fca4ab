//! Configuration for the statesearch service.
//!
//! Loaded once at process start from a TOML file, then overridden from the
//! environment. Everything downstream receives the resolved values; nothing
//! reads the environment after startup.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use statesearch_fanout::{TargetIndex, TargetUniverse};

use crate::azure::{AzureSearchConfig, DEFAULT_API_VERSION};
use crate::error::{Result, ServiceError};

/// Search service endpoint, e.g. `https://<service>.search.windows.net`.
pub const ENV_ENDPOINT: &str = "AZURE_SEARCH_ENDPOINT";
/// Admin or query key for the search service.
pub const ENV_API_KEY: &str = "AZURE_SEARCH_KEY";
/// REST API version.
pub const ENV_API_VERSION: &str = "AZURE_SEARCH_API_VERSION";
/// Default result cap.
pub const ENV_TOP_K: &str = "AZURE_SEARCH_INDEX_TOP_K";
/// HTTP bind host.
pub const ENV_HOST: &str = "HOST";
/// HTTP bind port.
pub const ENV_PORT: &str = "PORT";

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "statesearch.toml";

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Search provider settings.
    pub search: SearchSettings,
    /// HTTP API settings.
    pub server: ServerConfig,
    /// Searchable targets, in the order they are fanned out to by default.
    pub targets: Vec<TargetIndex>,
}

/// Search provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Service endpoint. Required to actually search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// API key sent as the `api-key` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// REST API version.
    pub api_version: String,
    /// Result cap when a request does not set one.
    pub top_k: usize,
    /// Per-request timeout for each index query.
    pub timeout_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: DEFAULT_API_VERSION.to_owned(),
            top_k: 5,
            timeout_seconds: 30,
        }
    }
}

impl fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("top_k", &self.top_k)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port (`0` to auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5001,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `path` and the process environment.
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged. The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, an
    /// environment override is malformed, or validation fails.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let config = Self::from_file(path)?;
            tracing::info!(path = %path.display(), "configuration loaded");
            config
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML file, with defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override does not parse.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.search.endpoint = Some(endpoint);
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.search.api_key = Some(key);
        }
        if let Some(version) = get(ENV_API_VERSION) {
            self.search.api_version = version;
        }
        if let Some(top_k) = get(ENV_TOP_K) {
            self.search.top_k = parse_env(ENV_TOP_K, &top_k)?;
        }
        if let Some(host) = get(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = get(ENV_PORT) {
            self.server.port = parse_env(ENV_PORT, &port)?;
        }
        Ok(())
    }

    /// Check settings that would otherwise fail at request time.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.search.top_k == 0 {
            return Err(ServiceError::Config("top_k must be greater than 0".into()));
        }
        if self.search.timeout_seconds == 0 {
            return Err(ServiceError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            let code = target.code.trim().to_ascii_lowercase();
            if code.is_empty() {
                return Err(ServiceError::Config("target code must not be empty".into()));
            }
            if target.index.trim().is_empty() {
                return Err(ServiceError::Config(format!(
                    "target '{}' has no index name",
                    target.code
                )));
            }
            if !seen.insert(code) {
                return Err(ServiceError::Config(format!(
                    "duplicate target code '{}'",
                    target.code
                )));
            }
        }
        Ok(())
    }

    /// The configured targets as a lookup universe.
    pub fn universe(&self) -> TargetUniverse {
        TargetUniverse::new(self.targets.clone())
    }

    /// Connection settings for the search provider backend.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if no endpoint is configured.
    pub fn backend_config(&self) -> Result<AzureSearchConfig> {
        let endpoint = self.search.endpoint.clone().ok_or_else(|| {
            ServiceError::Config(format!(
                "search endpoint is not configured (set {ENV_ENDPOINT} or [search].endpoint)"
            ))
        })?;
        let mut config = AzureSearchConfig::new(endpoint)
            .with_api_version(self.search.api_version.clone())
            .with_timeout(Duration::from_secs(self.search.timeout_seconds));
        if let Some(key) = &self.search.api_key {
            config = config.with_api_key(key.clone());
        }
        Ok(config)
    }

    /// Returns the default config file path: `./statesearch.toml`.
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ServiceError::Config(format!("{key} has an invalid value: '{value}'")))
}
