//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Outreach API connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where the bearer token comes from
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// File written by `leadboard login`
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// Explicit token; only ever set from `LEADBOARD_TOKEN`
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_token_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("leadboard").join("token.json"))
        .unwrap_or_else(|| PathBuf::from("./leadboard_token.json"))
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            token: None,
        }
    }
}

/// Poll cadence for long-running server jobs
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_secs: u64,

    #[serde(default = "default_send_interval")]
    pub send_interval_secs: u64,

    #[serde(default = "default_send_max_attempts")]
    pub send_max_attempts: u32,
}

fn default_scrape_interval() -> u64 {
    3
}

fn default_send_interval() -> u64 {
    5
}

fn default_send_max_attempts() -> u32 {
    60 // 5 minutes at the default interval
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            scrape_interval_secs: default_scrape_interval(),
            send_interval_secs: default_send_interval(),
            send_max_attempts: default_send_max_attempts(),
        }
    }
}

impl PollingConfig {
    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("leadboard").join("config.toml")),
            Some(PathBuf::from("/etc/leadboard/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LEADBOARD_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(timeout) = lookup("LEADBOARD_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.api.request_timeout_secs = secs;
            }
        }

        if let Some(token) = lookup("LEADBOARD_TOKEN") {
            if !token.trim().is_empty() {
                self.auth.token = Some(token);
            }
        }
        if let Some(path) = lookup("LEADBOARD_TOKEN_FILE") {
            self.auth.token_file = PathBuf::from(path);
        }

        if let Some(level) = lookup("LEADBOARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LEADBOARD_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Leadboard Configuration
#
# Environment variables override these settings:
# - LEADBOARD_BASE_URL
# - LEADBOARD_REQUEST_TIMEOUT
# - LEADBOARD_TOKEN (used instead of the token file)
# - LEADBOARD_TOKEN_FILE
# - LEADBOARD_LOG_LEVEL
# - LEADBOARD_LOG_FORMAT

[api]
# Outreach API base URL
base_url = "http://127.0.0.1:8000"

# Request timeout in seconds
request_timeout_secs = 30

[auth]
# Where `leadboard login` stores the bearer token
# token_file = "~/.local/share/leadboard/token.json"

[polling]
# Seconds between progress checks while a map scrape runs
scrape_interval_secs = 3

# Seconds between progress checks while a bulk send runs
send_interval_secs = 5

# Give up on a bulk send after this many checks
send_max_attempts = 60

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}
