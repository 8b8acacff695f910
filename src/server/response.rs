//! Export HTTP responses
//!
//! Turns an export request for one saved query into an HTTP response:
//! materialized outputs become a plain body, streamed outputs become a
//! streaming body that pulls one chunk per poll.

use std::collections::{BTreeMap, HashMap};

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::error::{ExportError, Result};
use crate::export::{ExportOptions, ExportOutput, ExporterRegistry, into_byte_stream};
use crate::query::{QueryHandle, parse_params};

/// Export parameters extracted from a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRequest {
    /// Format identifier; the registry default when absent
    pub format: Option<String>,
    /// Requested CSV delimiter
    pub delim: Option<String>,
    /// Attach the output as a file download
    pub download: bool,
    /// Query parameters to bind before execution
    pub params: BTreeMap<String, String>,
}

impl ExportRequest {
    /// Build from decoded query-string pairs
    ///
    /// Reads `format`, `delim` and `params` (`name:value|name2:value2`).
    pub fn from_query(query: &HashMap<String, String>, download: bool) -> Self {
        Self {
            format: query.get("format").filter(|f| !f.is_empty()).cloned(),
            delim: query.get("delim").cloned(),
            download,
            params: query
                .get("params")
                .map(|raw| parse_params(raw))
                .unwrap_or_default(),
        }
    }
}

/// Build the HTTP response for exporting `query`
///
/// An unknown format is returned as an error before the query runs. A query
/// engine failure becomes a `500` with a plain-text message naming the
/// query; any other failure is returned to the caller.
///
/// # Arguments
/// * `registry` - Configured export formats
/// * `request` - Export parameters
/// * `query` - Fresh handle for the saved query
///
/// # Returns
/// * `Result<Response>` - Response with body, content type and, for
///   downloads, a `Content-Disposition` header
pub async fn build_export_response(
    registry: &ExporterRegistry,
    request: &ExportRequest,
    mut query: Box<dyn QueryHandle>,
) -> Result<Response> {
    let format_id = request
        .format
        .as_deref()
        .unwrap_or_else(|| registry.default_format());
    let exporter = registry.resolve(format_id)?;

    if !request.params.is_empty() {
        query.set_params(request.params.clone());
    }

    let title = query.title().to_string();
    let mut options = ExportOptions::new().with_title(title.clone());
    options.delim = request.delim.clone();

    let output = match exporter.get_output(query.as_ref(), &options).await {
        Ok(output) => output,
        Err(ExportError::Query(e)) => {
            warn!("Export of '{}' failed: {}", title, e);
            return Ok(query_error_response(&title, &e.to_string()));
        }
        Err(e) => return Err(e),
    };

    debug!(
        "Responding with {} export of '{}' ({})",
        exporter.name(),
        title,
        if output.is_streamed() { "streamed" } else { "materialized" }
    );

    let body = match output {
        ExportOutput::Materialized(bytes) => Body::from(bytes),
        ExportOutput::Streamed(source) => {
            Body::from_stream(into_byte_stream(source).map_err(std::io::Error::other))
        }
    };

    let mut response = Response::new(body);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(exporter.content_type()),
    );

    if request.download {
        let disposition = format!("attachment; filename=\"{}\"", exporter.filename(&title));
        let value = HeaderValue::from_bytes(disposition.as_bytes())
            .map_err(|e| ExportError::Encoding(format!("invalid download filename: {e}")))?;
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

fn query_error_response(title: &str, message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Error executing query {title}: {message}"),
    )
        .into_response()
}
