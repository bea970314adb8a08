use thiserror::Error;

use crate::storage::models::DEFAULT_MAX_FILE_SIZE;
use crate::storage::DEFAULT_LOCAL_QUOTA;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum size of a single file in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
    /// Overrides `data_dir` when set
    pub database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Directory for the client's offline store
    pub data_dir: String,
    pub quota_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of a fileshare server. Clients run local-only when unset.
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            data_dir: "./data".to_string(),
            database_url: None,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            data_dir: "./local".to_string(),
            quota_bytes: DEFAULT_LOCAL_QUOTA,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 3000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            local: LocalConfig::default(),
            remote: RemoteConfig::default(),
            test_mode: false,
            max_upload_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or(defaults.server.bind_address);

        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.server.data_dir);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = env_u64("MAX_UPLOAD_SIZE").unwrap_or(defaults.max_upload_size);

        let local_data_dir = std::env::var("LOCAL_DATA_DIR").unwrap_or(defaults.local.data_dir);
        let quota_bytes = env_u64("LOCAL_QUOTA_BYTES").unwrap_or(defaults.local.quota_bytes);

        let base_url = std::env::var("REMOTE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());
        let timeout_ms = env_u64("REMOTE_TIMEOUT_MS").unwrap_or(defaults.remote.timeout_ms);

        let config = Config {
            server: ServerConfig {
                bind_address,
                data_dir,
                database_url,
            },
            local: LocalConfig {
                data_dir: local_data_dir,
                quota_bytes,
            },
            remote: RemoteConfig {
                base_url,
                timeout_ms,
            },
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than zero".to_string(),
            ));
        }

        if self.local.quota_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "LOCAL_QUOTA_BYTES must be greater than zero".to_string(),
            ));
        }

        if self.remote.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "REMOTE_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        if let Some(url) = &self.remote.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "REMOTE_URL must be an http(s) URL, got '{url}'"
                )));
            }
        }

        if self.test_mode {
            tracing::warn!("TEST_MODE is enabled; destructive admin routes are exposed");
        }

        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
