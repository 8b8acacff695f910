//! HTTP server for saved-query exports
//!
//! Routes:
//! - `GET /healthz`
//! - `GET /formats`: configured format identifiers
//! - `GET /queries/:id/download`: export as an attachment
//! - `GET /queries/:id/stream`: export inline
//!
//! Both export routes accept `format`, `delim` and `params` query fields.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{ExportError, Result};
use crate::export::ExporterRegistry;
use crate::query::QueryStore;

pub mod response;

pub use response::{ExportRequest, build_export_response};

/// Shared, read-only state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ExporterRegistry>,
    pub store: Arc<dyn QueryStore>,
}

impl AppState {
    pub fn new(registry: ExporterRegistry, store: Arc<dyn QueryStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/formats", get(list_formats))
        .route("/queries/:id/download", get(download_query))
        .route("/queries/:id/stream", get(stream_query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve exports until Ctrl+C
///
/// # Arguments
/// * `config` - Loaded configuration; supplies the bind address and formats
/// * `store` - Saved queries to serve
pub async fn serve(config: &Config, store: Arc<dyn QueryStore>) -> Result<()> {
    let registry = ExporterRegistry::from_config(&config.export)?;
    let app = router(AppState::new(registry, store));
    let bind: SocketAddr = config.server.bind;

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn list_formats(State(state): State<AppState>) -> Response {
    let formats: Vec<_> = state
        .registry
        .formats()
        .iter()
        .map(|entry| {
            let exporter = entry.exporter.build(',');
            json!({
                "id": entry.id,
                "name": exporter.name(),
                "content_type": exporter.content_type(),
                "extension": exporter.file_extension(),
            })
        })
        .collect();

    Json(json!({
        "default": state.registry.default_format(),
        "formats": formats,
    }))
    .into_response()
}

async fn download_query(
    state: State<AppState>,
    id: Path<String>,
    query: Query<HashMap<String, String>>,
) -> Response {
    export_query(state, id, query, true).await
}

async fn stream_query(
    state: State<AppState>,
    id: Path<String>,
    query: Query<HashMap<String, String>>,
) -> Response {
    export_query(state, id, query, false).await
}

async fn export_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    download: bool,
) -> Response {
    let Some(handle) = state.store.get(&id) else {
        return ExportError::NotFound(id).into_response();
    };

    let request = ExportRequest::from_query(&query, download);
    match build_export_response(&state.registry, &request, handle).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for ExportError {
    fn into_response(self) -> Response {
        match self {
            ExportError::UnknownFormat(_) | ExportError::NotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
            other => {
                error!("Export failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
