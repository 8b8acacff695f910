use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// Only [`ExportError::Query`] is recovered into a structured HTTP response;
/// every other variant is surfaced to the caller as-is.
#[derive(Debug)]
pub enum ExportError {
    /// Requested format identifier is not configured.
    UnknownFormat(String),

    /// The query engine failed while executing or fetching rows.
    Query(QueryError),

    /// An exporter failed to encode the result.
    Encoding(String),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// A requested query does not exist.
    NotFound(String),
}

/// Failure raised by the query engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    FileNotReadable { path: String, reason: String },

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::UnknownFormat(id) => write!(f, "Unknown export format: {id}"),
            ExportError::Query(e) => write!(f, "{e}"),
            ExportError::Encoding(msg) => write!(f, "Encoding error: {msg}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::NotFound(what) => write!(f, "Not found: {what}"),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotReadable { path, reason } => {
                write!(f, "Cannot read config file {path}: {reason}")
            }
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Query(e) => Some(e),
            ExportError::Config(e) => Some(e),
            ExportError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for QueryError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<QueryError> for ExportError {
    fn from(err: QueryError) -> Self {
        ExportError::Query(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Encoding(format!("CSV writer failed: {err}"))
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Encoding(format!("JSON serialization failed: {err}"))
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Encoding(format!("Spreadsheet writer failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display_is_raw_detail() {
        let err: ExportError = QueryError::new("relation \"foo\" does not exist").into();
        assert_eq!(err.to_string(), "relation \"foo\" does not exist");
    }

    #[test]
    fn test_unknown_format_display() {
        let err = ExportError::UnknownFormat("parquet".to_string());
        assert_eq!(err.to_string(), "Unknown export format: parquet");
    }

    #[test]
    fn test_config_error_source() {
        use std::error::Error;
        let err: ExportError = ConfigError::InvalidFormat("bad".into()).into();
        assert!(err.source().is_some());
    }
}
