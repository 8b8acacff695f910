//! Configuration management for query-export
//!
//! This module handles loading, parsing, and validating configuration:
//! - Configuration file (TOML format)
//! - Command-line arguments (applied by the CLI layer)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values
//!
//! # Example
//!
//! ```toml
//! [export]
//! csv_delimiter = ";"
//!
//! [[export.formats]]
//! id = "csv"
//! exporter = "csv"
//!
//! [[export.formats]]
//! id = "excel"
//! exporter = "excel"
//!
//! [server]
//! bind = "0.0.0.0:8040"
//! queries = "queries.json"
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::export::ExporterKind;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Export-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Delimiter used when the caller does not supply a usable one
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,

    /// Format identifiers and the exporter each one resolves to
    #[serde(default = "default_formats")]
    pub formats: Vec<FormatEntry>,
}

/// A single `format id -> exporter` mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatEntry {
    /// Identifier accepted in the `format` request parameter
    pub id: String,

    /// Exporter implementation behind the identifier
    pub exporter: ExporterKind,
}

impl FormatEntry {
    pub fn new(id: impl Into<String>, exporter: ExporterKind) -> Self {
        Self {
            id: id.into(),
            exporter,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Fixture file with the queries to serve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries: Option<PathBuf>,
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
fn default_csv_delimiter() -> char {
    ','
}

fn default_formats() -> Vec<FormatEntry> {
    vec![
        FormatEntry::new("csv", ExporterKind::Csv),
        FormatEntry::new("csv-stream", ExporterKind::StreamingCsv),
        FormatEntry::new("json", ExporterKind::Json),
        FormatEntry::new("xlsx", ExporterKind::Excel),
    ]
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8040))
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_delimiter: default_csv_delimiter(),
            formats: default_formats(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            queries: None,
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
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// Falls back to the default path when `path` is `None`; a missing file
    /// yields the default configuration.
    ///
    /// # Arguments
    /// * `path` - Optional path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileNotReadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".query-export")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        self.export.validate()
    }
}

impl ExportConfig {
    /// Validate delimiter and format table
    pub fn validate(&self) -> Result<()> {
        let delim = self.csv_delimiter;
        if !delim.is_ascii() || matches!(delim, '"' | '\n' | '\r') {
            return Err(ConfigError::InvalidValue {
                field: "export.csv_delimiter".to_string(),
                value: delim.escape_default().to_string(),
            }
            .into());
        }

        if self.formats.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "export.formats".to_string(),
                value: "[]".to_string(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for entry in &self.formats {
            if entry.id.trim().is_empty() || !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "export.formats.id".to_string(),
                    value: entry.id.clone(),
                }
                .into());
            }
        }

        Ok(())
    }
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
