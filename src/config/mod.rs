//! Configuration management for portal-export
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables (`NODE`, `ES_USER`, `ES_PASSWORD`)
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store connection configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the search node
    #[serde(default = "default_node")]
    pub node: String,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept self-signed or otherwise invalid TLS certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Number of documents requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum number of concurrent point lookups during enrichment
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,

    /// Whole-request timeout in seconds (0 disables it)
    #[serde(default)]
    pub request_timeout: u64,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default export format token (csv, tsv)
    #[serde(default = "default_format")]
    pub format: String,

    /// Directory where export files are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory containing `<index>.json` field-mapping descriptions
    #[serde(default = "default_mapping_dir")]
    pub mapping_dir: PathBuf,

    /// Show a progress bar while fetching
    #[serde(default = "default_progress")]
    pub progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_node() -> String {
    "http://localhost:9200".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> usize {
    50_000
}

fn default_lookup_concurrency() -> usize {
    8
}

fn default_format() -> String {
    "csv".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_mapping_dir() -> PathBuf {
    PathBuf::from("mapping")
}

fn default_progress() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl StoreConfig {
    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            node: default_node(),
            username: None,
            password: None,
            timeout: default_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            lookup_concurrency: default_lookup_concurrency(),
            request_timeout: 0,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_dir: default_output_dir(),
            mapping_dir: default_mapping_dir(),
            progress: default_progress(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from a file
    ///
    /// An explicitly requested file must exist. When no path is given the
    /// default location is tried and defaults are used if it is absent.
    ///
    /// # Arguments
    /// * `path` - Optional path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if required {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            crate::error::PortalError::Config(ConfigError::InvalidFormat(msg)) => {
                ConfigError::InvalidFormat(format!("{}: {}", path.display(), msg)).into()
            }
            other => other,
        })
    }

    /// Apply environment variable overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides using a custom lookup
    ///
    /// Recognized variables: `NODE`, `ES_USER`, `ES_PASSWORD`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(node) = lookup("NODE").filter(|v| !v.is_empty()) {
            self.store.node = node;
        }
        if let Some(user) = lookup("ES_USER") {
            self.store.username = Some(user);
        }
        if let Some(password) = lookup("ES_PASSWORD") {
            self.store.password = Some(password);
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".portal-export")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.store.node.trim().is_empty() {
            return Err(invalid("store.node", &self.store.node));
        }
        if self.fetch.page_size == 0 {
            return Err(invalid("fetch.page_size", "0"));
        }
        if self.fetch.lookup_concurrency == 0 {
            return Err(invalid("fetch.lookup_concurrency", "0"));
        }
        Ok(())
    }

    /// Serialize the effective configuration as TOML, with the password masked
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.store.password.is_some() {
            shown.store.password = Some("****".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the whole-request timeout, if enabled
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.fetch.request_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn invalid(field: &str, value: &str) -> crate::error::PortalError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
