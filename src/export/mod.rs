//! Export module for turning query results into downloadable bytes
//!
//! This module provides a pluggable export system that supports:
//! - Materialized exports (CSV, JSON, spreadsheet) built fully in memory
//! - A streaming CSV export that pulls rows from a live cursor on demand
//! - A registry mapping configured format identifiers to exporters
//!
//! # Architecture
//!
//! The export system is built on three main components:
//!
//! 1. **Exporter**: converts a [`TabularResult`] into an [`ExportOutput`]
//! 2. **ChunkSource**: pull interface behind streamed outputs
//! 3. **ExporterRegistry**: resolves a format identifier to an exporter
//!
//! # Example
//!
//! ```no_run
//! use query_export::config::ExportConfig;
//! use query_export::export::{ExportOptions, ExporterRegistry};
//! use query_export::query::{FixtureStore, QueryStore};
//!
//! # async fn run() -> query_export::Result<()> {
//! let registry = ExporterRegistry::from_config(&ExportConfig::default())?;
//! let exporter = registry.resolve("csv")?;
//! let store = FixtureStore::from_file("queries.json")?;
//! let query = store.get("signups").unwrap();
//! let output = exporter.get_output(query.as_ref(), &ExportOptions::new()).await?;
//! let bytes = output.into_bytes().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::Result;
use crate::query::{FetchMode, QueryHandle, TabularResult};
use crate::utils::get_valid_filename;

pub mod registry;
pub mod streaming;
pub mod writers;

pub use registry::{ExporterKind, ExporterRegistry};
pub use streaming::{ChunkSource, CsvChunkSource, collect_chunks, into_byte_stream};
pub use writers::{CsvExporter, ExcelExporter, JsonExporter, StreamingCsvExporter};

/// Literal accepted in place of an actual tab character
pub const TAB_MARKER: &str = "tab";

/// Caller-supplied export options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Requested delimiter: a single character or [`TAB_MARKER`]
    pub delim: Option<String>,
    /// Title of the exported query; filled from the query handle when empty
    pub title: String,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delim: impl Into<String>) -> Self {
        self.delim = Some(delim.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Resolve the effective CSV delimiter
///
/// `tab` becomes `\t`. Anything longer than one character falls back to the
/// configured default, as does a single character the CSV writer cannot use
/// (non-ASCII, quote or line break).
///
/// # Arguments
/// * `requested` - Delimiter supplied by the caller, if any
/// * `default` - Configured default delimiter
///
/// # Returns
/// * `u8` - Delimiter byte for the CSV writer
pub fn resolve_delimiter(requested: Option<&str>, default: char) -> u8 {
    let fallback = default as u8;

    let Some(raw) = requested.filter(|s| !s.is_empty()) else {
        return fallback;
    };

    let delim = if raw == TAB_MARKER { "\t" } else { raw };

    let mut chars = delim.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && !matches!(c, '"' | '\n' | '\r') => c as u8,
        (Some(_), None) => {
            warn!("Delimiter {:?} is not usable, falling back to default", delim);
            fallback
        }
        _ => {
            debug!(
                "Delimiter {:?} is longer than one character, using default {:?}",
                delim, default
            );
            fallback
        }
    }
}

/// What an exporter produced
pub enum ExportOutput {
    /// Fully built in memory
    Materialized(Bytes),
    /// Produced chunk by chunk, on demand
    Streamed(Box<dyn ChunkSource>),
}

impl ExportOutput {
    /// Whether the output must be delivered as a streamed body
    pub fn is_streamed(&self) -> bool {
        matches!(self, ExportOutput::Streamed(_))
    }

    /// Collect the output into one buffer, draining streamed outputs
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self {
            ExportOutput::Materialized(bytes) => Ok(bytes),
            ExportOutput::Streamed(source) => collect_chunks(source).await.map(Bytes::from),
        }
    }
}

impl fmt::Debug for ExportOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportOutput::Materialized(bytes) => {
                f.debug_tuple("Materialized").field(&bytes.len()).finish()
            }
            ExportOutput::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// Trait implemented by every export format
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Human-readable format name
    fn name(&self) -> &'static str;

    /// MIME type of the produced bytes
    fn content_type(&self) -> &'static str;

    /// File extension including the leading dot
    fn file_extension(&self) -> &'static str;

    /// How rows should be fetched for this exporter
    fn fetch_mode(&self) -> FetchMode {
        FetchMode::Materialize
    }

    /// Convert an executed result
    ///
    /// # Arguments
    /// * `result` - Executed query result, consumed by the export
    /// * `options` - Caller-supplied options
    ///
    /// # Returns
    /// * `Result<ExportOutput>` - Materialized bytes or a chunk source
    async fn export(&self, result: TabularResult, options: &ExportOptions) -> Result<ExportOutput>;

    /// Execute the query once and export its result
    ///
    /// Query engine failures come back as [`crate::error::ExportError::Query`].
    async fn get_output(
        &self,
        query: &dyn QueryHandle,
        options: &ExportOptions,
    ) -> Result<ExportOutput> {
        let mut options = options.clone();
        if options.title.is_empty() {
            options.title = query.title().to_string();
        }

        debug!("Executing '{}' for {} export", options.title, self.name());
        let result = query.execute(self.fetch_mode()).await?;
        self.export(result, &options).await
    }

    /// Download filename for a query title
    fn filename(&self, title: &str) -> String {
        format!("{}{}", get_valid_filename(title), self.file_extension())
    }
}
