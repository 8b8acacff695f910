//! JSON exporter
//!
//! Produces an array with one object per row, keyed by header strings.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::encoder::{CellConverter, JsonConverter};
use crate::error::Result;
use crate::export::{ExportOptions, ExportOutput, Exporter};
use crate::query::TabularResult;

/// Materialized JSON exporter
///
/// Headers are not deduplicated: when two headers coincide the later
/// column's value wins.
pub struct JsonExporter {
    converter: JsonConverter,
}

impl JsonExporter {
    pub fn new() -> Self {
        Self {
            converter: JsonConverter::new(),
        }
    }
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn file_extension(&self) -> &'static str {
        ".json"
    }

    async fn export(&self, mut result: TabularResult, _options: &ExportOptions) -> Result<ExportOutput> {
        result.fetch_all().await?;
        let keys = result.header_strings();

        let objects: Vec<JsonValue> = result
            .data
            .iter()
            .map(|row| {
                let mut object = Map::with_capacity(keys.len());
                for (key, cell) in keys.iter().zip(row) {
                    object.insert(key.clone(), self.converter.convert(cell));
                }
                JsonValue::Object(object)
            })
            .collect();

        let buf = serde_json::to_vec(&objects)?;
        info!("Exported {} rows to JSON ({} bytes)", objects.len(), buf.len());
        Ok(ExportOutput::Materialized(Bytes::from(buf)))
    }
}
