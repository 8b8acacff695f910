//! Fixture-backed queries
//!
//! Serves canned results from a JSON file so the server and the `export`
//! command have something to export without a database. Cell literals are
//! plain JSON plus a few tagged objects for the richer types:
//!
//! ```json
//! [
//!   {
//!     "id": "signups",
//!     "title": "Daily signups",
//!     "headers": ["day", "count", "owner"],
//!     "rows": [[{"$date": "2024-01-01T00:00:00Z"}, 12, {"$uuid": "67e55044-10b1-426f-9247-bb680e5fe0c8"}]]
//!   },
//!   { "id": "broken", "title": "Broken", "error": "relation \"x\" does not exist" }
//! ]
//! ```
//!
//! `$$name$$` placeholders inside text cells are replaced by the parameters
//! attached with [`QueryHandle::set_params`].

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ConfigError, QueryError, Result};

use super::{CellValue, FetchMode, QueryHandle, QueryStore, Row, TabularResult, VecCursor};

/// A single canned query
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureQuery {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub headers: Vec<Option<String>>,
    #[serde(default)]
    pub rows: Vec<Vec<JsonValue>>,
    /// When set, execution fails with this message.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(skip)]
    params: BTreeMap<String, String>,
}

impl FixtureQuery {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            headers: Vec::new(),
            rows: Vec::new(),
            error: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_headers<S: AsRef<str>>(mut self, headers: &[Option<S>]) -> Self {
        self.headers = headers
            .iter()
            .map(|h| h.as_ref().map(|s| s.as_ref().to_string()))
            .collect();
        self
    }

    pub fn with_rows(mut self, rows: Vec<Vec<JsonValue>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Parameters currently attached to the query
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    fn build_rows(&self) -> std::result::Result<Vec<Row>, QueryError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                if raw.len() != self.headers.len() {
                    return Err(QueryError::new(format!(
                        "row {} has {} cells, expected {}",
                        idx,
                        raw.len(),
                        self.headers.len()
                    )));
                }
                raw.iter()
                    .map(|value| cell_from_json(value, &self.params))
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl QueryHandle for FixtureQuery {
    fn title(&self) -> &str {
        &self.title
    }

    fn set_params(&mut self, params: BTreeMap<String, String>) {
        self.params = params;
    }

    async fn execute(&self, mode: FetchMode) -> std::result::Result<TabularResult, QueryError> {
        if let Some(message) = &self.error {
            return Err(QueryError::new(message.clone()));
        }

        let rows = self.build_rows()?;
        debug!(
            "Executed fixture query '{}' ({} rows, {:?})",
            self.id,
            rows.len(),
            mode
        );

        Ok(match mode {
            FetchMode::Materialize => TabularResult::materialized(self.headers.clone(), rows),
            FetchMode::Stream => {
                TabularResult::streaming(self.headers.clone(), Box::new(VecCursor::new(rows)))
            }
        })
    }
}

/// Collection of fixture queries keyed by id
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    queries: BTreeMap<String, FixtureQuery>,
}

impl FixtureStore {
    pub fn new(queries: Vec<FixtureQuery>) -> Self {
        Self {
            queries: queries.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }

    /// Parse fixtures from a JSON array
    pub fn from_json(json: &str) -> Result<Self> {
        let queries: Vec<FixtureQuery> = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidFormat(format!("fixture file: {e}")))?;
        Ok(Self::new(queries))
    }

    /// Load fixtures from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileNotReadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl QueryStore for FixtureStore {
    fn get(&self, id: &str) -> Option<Box<dyn QueryHandle>> {
        self.queries
            .get(id)
            .cloned()
            .map(|q| Box::new(q) as Box<dyn QueryHandle>)
    }
}

/// Convert a fixture literal into a cell
fn cell_from_json(
    value: &JsonValue,
    params: &BTreeMap<String, String>,
) -> std::result::Result<CellValue, QueryError> {
    let cell = match value {
        JsonValue::Null => CellValue::Null,
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => CellValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => CellValue::Text(substitute_params(s, params)),
        JsonValue::Object(map) => match tagged_literal(map)? {
            Some(cell) => cell,
            None => CellValue::Json(value.clone()),
        },
        JsonValue::Array(_) => CellValue::Json(value.clone()),
    };
    Ok(cell)
}

/// Decode `{"$date": ..}`, `{"$uuid": ..}` and `{"$decimal": ..}` objects
fn tagged_literal(
    map: &serde_json::Map<String, JsonValue>,
) -> std::result::Result<Option<CellValue>, QueryError> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((tag, JsonValue::String(s))) = map.iter().next() else {
        return Ok(None);
    };

    let cell = match tag.as_str() {
        "$date" => parse_date_literal(s)?,
        "$uuid" => Uuid::parse_str(s)
            .map(CellValue::Uuid)
            .map_err(|e| QueryError::new(format!("invalid uuid '{s}': {e}")))?,
        "$decimal" => CellValue::Decimal(s.clone()),
        _ => return Ok(None),
    };
    Ok(Some(cell))
}

fn parse_date_literal(s: &str) -> std::result::Result<CellValue, QueryError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(CellValue::Timestamp(dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(CellValue::NaiveTimestamp(dt));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(CellValue::Date(d));
    }
    Err(QueryError::new(format!("invalid date literal '{s}'")))
}

fn substitute_params(text: &str, params: &BTreeMap<String, String>) -> String {
    if !text.contains("$$") {
        return text.to_string();
    }
    params.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("$${name}$$"), value)
    })
}
