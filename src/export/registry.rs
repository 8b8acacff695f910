//! Format registry
//!
//! Maps the format identifiers accepted in requests to exporter
//! implementations. The table comes from configuration and is immutable once
//! built, so a single registry can be shared across requests behind an `Arc`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ExportConfig, FormatEntry};
use crate::error::{ExportError, Result};

use super::Exporter;
use super::writers::{CsvExporter, ExcelExporter, JsonExporter, StreamingCsvExporter};

/// Exporter implementations a format identifier can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExporterKind {
    Csv,
    StreamingCsv,
    Json,
    Excel,
}

impl ExporterKind {
    /// Instantiate the exporter
    ///
    /// # Arguments
    /// * `default_delimiter` - Configured CSV delimiter
    pub fn build(self, default_delimiter: char) -> Box<dyn Exporter> {
        match self {
            ExporterKind::Csv => Box::new(CsvExporter::new(default_delimiter)),
            ExporterKind::StreamingCsv => Box::new(StreamingCsvExporter::new(default_delimiter)),
            ExporterKind::Json => Box::new(JsonExporter::new()),
            ExporterKind::Excel => Box::new(ExcelExporter::new()),
        }
    }

    /// Whether the kind produces CSV
    pub fn is_csv(self) -> bool {
        matches!(self, ExporterKind::Csv | ExporterKind::StreamingCsv)
    }
}

/// Registry of configured export formats
#[derive(Debug, Clone)]
pub struct ExporterRegistry {
    entries: Vec<FormatEntry>,
    default_delimiter: char,
}

impl ExporterRegistry {
    /// Build the registry from configuration
    ///
    /// Fails when the configuration is invalid (empty table, duplicate ids,
    /// unusable default delimiter).
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Export registry: {}",
            config
                .formats
                .iter()
                .map(|e| e.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            entries: config.formats.clone(),
            default_delimiter: config.csv_delimiter,
        })
    }

    /// Resolve a format identifier to an exporter
    ///
    /// # Returns
    /// * `Result<Box<dyn Exporter>>` - Exporter, or `UnknownFormat`
    pub fn resolve(&self, format_id: &str) -> Result<Box<dyn Exporter>> {
        self.kind(format_id)
            .map(|kind| kind.build(self.default_delimiter))
            .ok_or_else(|| ExportError::UnknownFormat(format_id.to_string()))
    }

    /// Exporter kind configured for an identifier
    pub fn kind(&self, format_id: &str) -> Option<ExporterKind> {
        self.entries
            .iter()
            .find(|entry| entry.id == format_id)
            .map(|entry| entry.exporter)
    }

    /// Identifier used when a request names no format
    ///
    /// The first identifier bound to a CSV exporter, else `csv`.
    pub fn default_format(&self) -> &str {
        self.entries
            .iter()
            .find(|entry| entry.exporter.is_csv())
            .map(|entry| entry.id.as_str())
            .unwrap_or("csv")
    }

    /// Configured formats, in configuration order
    pub fn formats(&self) -> &[FormatEntry] {
        &self.entries
    }
}
