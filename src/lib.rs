//! Query Export Library
//!
//! This library turns the results of saved queries into downloadable files:
//! CSV (materialized or streamed row by row), JSON and XLSX. It can be used
//! on its own to export query results, or through the bundled HTTP server.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `encoder`: Cell value conversion strategies
//! - `error`: Error types and handling
//! - `export`: Exporters, format registry and streaming
//! - `query`: Query handles, cursors and the fixture store
//! - `server`: HTTP routes and export responses
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use query_export::config::Config;
//! use query_export::export::{ExportOptions, ExporterRegistry};
//! use query_export::query::{FixtureStore, QueryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let registry = ExporterRegistry::from_config(&config.export)?;
//!     let store = FixtureStore::from_file("queries.json")?;
//!
//!     let query = store.get("signups").ok_or("no such query")?;
//!     let exporter = registry.resolve("json")?;
//!     let output = exporter.get_output(query.as_ref(), &ExportOptions::new()).await?;
//!     println!("{}", String::from_utf8_lossy(&output.into_bytes().await?));
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod query;
pub mod server;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportOptions, ExportOutput, Exporter, ExporterRegistry};
pub use query::{CellValue, QueryHandle, QueryStore, TabularResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
