//! Error handling module for export operations.
//!
//! Every fallible function in the crate returns [`Result`], whose error side is
//! [`ExportError`]. Query engine failures are carried as [`QueryError`] so the
//! response layer can recognise them and turn them into a server-error response;
//! all other kinds propagate untouched.
//!
//! # Example
//!
//! ```rust
//! use query_export::error::{ExportError, QueryError, Result};
//!
//! fn run_query() -> Result<()> {
//!     Err(QueryError::new("connection reset").into())
//! }
//!
//! assert!(matches!(run_query(), Err(ExportError::Query(_))));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{ConfigError, ExportError, QueryError, Result};
