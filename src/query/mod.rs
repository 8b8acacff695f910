//! Tabular query results as seen by the exporters
//!
//! The query engine itself lives outside this crate. Exporters only see it
//! through two narrow seams:
//!
//! 1. **QueryHandle**: a not-yet-executed query that knows its title, accepts
//!    caller parameters and executes exactly once per export
//! 2. **RowCursor**: a forward-only row source used for streaming exports
//!
//! Execution yields a [`TabularResult`]: the column headers plus either the
//! materialized rows or a live cursor, depending on the [`FetchMode`] the
//! exporter asked for.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::error::{QueryError, Result};

pub mod cursor;
pub mod fixture;

pub use cursor::{RowCursor, VecCursor};
pub use fixture::{FixtureQuery, FixtureStore};

/// A single row; its length always equals the number of headers.
pub type Row = Vec<CellValue>;

/// A single cell as produced by the query engine
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision decimal kept in its canonical textual form.
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    /// Timezone-aware timestamp.
    Timestamp(DateTime<FixedOffset>),
    /// Timestamp without timezone information.
    NaiveTimestamp(NaiveDateTime),
    Uuid(Uuid),
    /// Nested mapping or sequence (JSON and array columns).
    Json(serde_json::Value),
}

impl CellValue {
    /// Whether this value is a nested mapping or sequence
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            CellValue::Json(serde_json::Value::Object(_) | serde_json::Value::Array(_))
        )
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Int(n)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<Uuid> for CellValue {
    fn from(u: Uuid) -> Self {
        CellValue::Uuid(u)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// How the exporter wants the rows delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Fetch every row into [`TabularResult::data`].
    Materialize,
    /// Leave the rows on the server behind [`TabularResult::cursor`].
    Stream,
}

/// Result of executing a query
pub struct TabularResult {
    /// Column headers; engines may report unnamed columns as `None`.
    pub headers: Vec<Option<String>>,
    /// Materialized rows (empty when streaming).
    pub data: Vec<Row>,
    /// Live row source, present when executed with [`FetchMode::Stream`].
    pub cursor: Option<Box<dyn RowCursor>>,
}

impl TabularResult {
    /// Build a fully materialized result
    pub fn materialized(headers: Vec<Option<String>>, data: Vec<Row>) -> Self {
        Self {
            headers,
            data,
            cursor: None,
        }
    }

    /// Build a cursor-backed result
    pub fn streaming(headers: Vec<Option<String>>, cursor: Box<dyn RowCursor>) -> Self {
        Self {
            headers,
            data: Vec::new(),
            cursor: Some(cursor),
        }
    }

    /// Headers coerced to display strings (`None` becomes `""`)
    pub fn header_strings(&self) -> Vec<String> {
        self.headers
            .iter()
            .map(|h| h.clone().unwrap_or_default())
            .collect()
    }

    /// Take the live cursor, or wrap the materialized rows in one
    ///
    /// A result can be consumed this way only once; afterwards both the cursor
    /// and the data are empty.
    pub fn take_cursor(&mut self) -> Box<dyn RowCursor> {
        match self.cursor.take() {
            Some(cursor) => cursor,
            None => Box::new(VecCursor::new(std::mem::take(&mut self.data))),
        }
    }

    /// Drain a live cursor into [`TabularResult::data`]
    ///
    /// No-op when the result is already materialized.
    pub async fn fetch_all(&mut self) -> Result<()> {
        let Some(mut cursor) = self.cursor.take() else {
            return Ok(());
        };

        while let Some(row) = cursor.next_row().await? {
            self.data.push(row);
        }
        cursor.close().await?;

        debug!("Materialized {} rows from cursor", self.data.len());
        Ok(())
    }
}

impl fmt::Debug for TabularResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularResult")
            .field("headers", &self.headers)
            .field("rows", &self.data.len())
            .field("has_cursor", &self.cursor.is_some())
            .finish()
    }
}

/// A query that has not been executed yet
#[async_trait]
pub trait QueryHandle: Send + Sync {
    /// Human-readable title, used for sheet names, filenames and error messages
    fn title(&self) -> &str;

    /// Attach caller-supplied parameters before execution
    fn set_params(&mut self, params: BTreeMap<String, String>);

    /// Execute the query
    ///
    /// # Arguments
    /// * `mode` - Whether rows should be materialized or left behind a cursor
    async fn execute(&self, mode: FetchMode) -> std::result::Result<TabularResult, QueryError>;
}

/// Source of saved queries, looked up by id
pub trait QueryStore: Send + Sync {
    /// Fetch a fresh, unexecuted handle for the query
    fn get(&self, id: &str) -> Option<Box<dyn QueryHandle>>;
}

/// Parse the `params` request field (`name:value|name2:value2`)
///
/// Entries without a `:` are ignored; the value keeps any further colons.
pub fn parse_params(raw: &str) -> BTreeMap<String, String> {
    raw.split('|')
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
