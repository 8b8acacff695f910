//! Strategy implementations for cell conversion
//!
//! This module provides concrete implementations of the converter trait:
//! - PlainTextConverter: Simple string conversion for delimited text
//! - JsonConverter: JSON value conversion
//! - CellEncoder: Scalar normalization for spreadsheet cells

use serde_json::Value as JsonValue;
use tracing::warn;

use super::converter::CellConverter;
use super::helpers::*;
use crate::query::CellValue;

/// Plain text converter for simple string conversion
///
/// Used for CSV output. Nulls become empty fields.
pub struct PlainTextConverter;

impl PlainTextConverter {
    /// Create a new plain text converter
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl CellConverter for PlainTextConverter {
    type Output = String;

    fn convert(&self, value: &CellValue) -> String {
        match value {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Int(n) => n.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Decimal(d) => d.clone(),
            CellValue::Text(s) => s.clone(),
            CellValue::Date(d) => date_to_iso_string(d),
            CellValue::Timestamp(dt) => timestamp_to_display(dt),
            CellValue::NaiveTimestamp(dt) => naive_timestamp_to_display(dt),
            CellValue::Uuid(u) => u.hyphenated().to_string(),
            CellValue::Json(JsonValue::String(s)) => s.clone(),
            CellValue::Json(JsonValue::Null) => String::new(),
            CellValue::Json(v) => json_to_compact_string(v),
        }
    }
}

/// JSON converter
///
/// Numbers and booleans stay native; timestamps, identifiers and decimals
/// are rendered as strings in their canonical form.
pub struct JsonConverter;

impl JsonConverter {
    /// Create a new JSON converter
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl CellConverter for JsonConverter {
    type Output = JsonValue;

    fn convert(&self, value: &CellValue) -> JsonValue {
        match value {
            CellValue::Null => JsonValue::Null,
            CellValue::Bool(b) => JsonValue::Bool(*b),
            CellValue::Int(n) => JsonValue::Number((*n).into()),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            CellValue::Decimal(d) => JsonValue::String(d.clone()),
            CellValue::Text(s) => JsonValue::String(s.clone()),
            CellValue::Date(d) => JsonValue::String(date_to_iso_string(d)),
            CellValue::Timestamp(dt) => JsonValue::String(timestamp_to_iso_string(dt)),
            CellValue::NaiveTimestamp(dt) => {
                JsonValue::String(naive_timestamp_to_iso_string(dt))
            }
            CellValue::Uuid(u) => JsonValue::String(u.hyphenated().to_string()),
            CellValue::Json(v) => v.clone(),
        }
    }
}

/// Longest text a worksheet cell can hold, in characters
pub const MAX_CELL_TEXT_LEN: usize = 32_767;

/// Spreadsheet cell encoder
///
/// Worksheet cells hold only scalars, and the writer has no native type for
/// timezone-aware timestamps or UUIDs. Those become their display strings,
/// nested values become compact JSON, JSON scalars are unwrapped, and the
/// rest passes through unchanged. Text longer than [`MAX_CELL_TEXT_LEN`] is
/// cut to fit.
pub struct CellEncoder;

impl CellEncoder {
    /// Create a new spreadsheet cell encoder
    pub fn new() -> Self {
        Self
    }

    /// Cut text to what a worksheet cell can hold
    pub fn fit_text(&self, text: String) -> String {
        match text.char_indices().nth(MAX_CELL_TEXT_LEN) {
            Some((cut, _)) => {
                warn!(
                    "Truncating {} character cell text to {}",
                    text.chars().count(),
                    MAX_CELL_TEXT_LEN
                );
                let mut text = text;
                text.truncate(cut);
                text
            }
            None => text,
        }
    }

    fn flatten(&self, value: &CellValue) -> CellValue {
        match value {
            CellValue::Json(v) if value.is_nested() => CellValue::Text(json_to_compact_string(v)),
            CellValue::Json(JsonValue::Null) => CellValue::Null,
            CellValue::Json(JsonValue::Bool(b)) => CellValue::Bool(*b),
            CellValue::Json(JsonValue::Number(n)) => match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => n
                    .as_f64()
                    .map(CellValue::Float)
                    .unwrap_or_else(|| CellValue::Text(n.to_string())),
            },
            CellValue::Json(JsonValue::String(s)) => CellValue::Text(s.clone()),
            CellValue::Date(d) => CellValue::Text(date_to_iso_string(d)),
            CellValue::Timestamp(dt) => CellValue::Text(timestamp_to_display(dt)),
            CellValue::NaiveTimestamp(dt) => CellValue::Text(naive_timestamp_to_display(dt)),
            CellValue::Uuid(u) => CellValue::Text(u.hyphenated().to_string()),
            other => other.clone(),
        }
    }
}

impl Default for CellEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CellConverter for CellEncoder {
    type Output = CellValue;

    fn convert(&self, value: &CellValue) -> CellValue {
        match self.flatten(value) {
            CellValue::Text(s) => CellValue::Text(self.fit_text(s)),
            other => other,
        }
    }
}
