//! Format writers for export operations
//!
//! One exporter per output format. Only [`StreamingCsvExporter`] produces a
//! streamed output; the others build the whole file in memory.

pub mod csv;
pub mod excel;
pub mod json;

pub use self::csv::{CsvExporter, StreamingCsvExporter};
pub use excel::ExcelExporter;
pub use json::JsonExporter;

/// UTF-8 byte-order mark written ahead of materialized CSV output
pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
