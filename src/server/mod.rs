//! HTTP daemon/server mode for `boolsearch`.
//!
//! This module exposes a small HTTP+JSON API over a single document
//! store:
//!
//! - `GET /v1/health` – simple health check endpoint.
//! - `POST /v1/search` – accepts a `SearchRequest` and returns a
//!   `SearchResponse`.
//! - `POST /v1/convert` – accepts a `ConvertRequest` and returns the
//!   native query without running it.
//! - `POST /v1/documents` – accepts an `IndexRequest` and returns the
//!   store's `IndexSummary` after the write.
//! - `GET /v1/info` – returns the store's `IndexSummary`.
//!
//! Store access is synchronous, so every request opens the store inside
//! `spawn_blocking`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::models::{
    ConvertRequest, ConvertResponse, Dialect, IndexRequest, IndexSummary, SearchRequest,
    SearchResponse, StoreConfig,
};
use crate::search::{convert_query, SearchEngine, SearchError};
use crate::store::{get_index_info, open_store};

/// Store and dialect served by the daemon.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub store: StoreConfig,
    pub dialect: Dialect,
}

/// Simple health-check response payload.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// JSON error body returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error type used by HTTP handlers to map internal failures into
/// JSON error responses.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        if message.starts_with("index not found at ") {
            Self {
                status: StatusCode::NOT_FOUND,
                message,
            }
        } else {
            ApiError::internal(message)
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Query(_)
            | SearchError::UnknownDocumentType(_)
            | SearchError::UnsupportedOrdering(_) => ApiError::bad_request(err.to_string()),
            SearchError::Config(_) => ApiError::internal(err.to_string()),
            SearchError::Storage(inner) => ApiError::from(inner),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "request failed");
        }
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Build the Axum router for the boolsearch HTTP API.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/search", post(search))
        .route("/v1/convert", post(convert))
        .route("/v1/documents", post(index_documents))
        .route("/v1/info", get(index_info))
        .with_state(Arc::new(state))
}

/// Run the HTTP server bound to the provided socket address.
///
/// This is used by the CLI `boolsearch serve` subcommand.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, state).await
}

/// Run the HTTP server using an existing `TcpListener`.
///
/// This is primarily used in tests to bind to an ephemeral port.
pub async fn serve_with_listener(listener: TcpListener, state: ServerState) -> Result<()> {
    info!(
        addr = %listener.local_addr()?,
        db = %state.store.path.display(),
        dialect = %state.dialect,
        "serving boolsearch HTTP API"
    );
    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn blocking<T, F>(task: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::internal(format!("worker task failed: {err}")))?
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn search(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let response = blocking(move || {
        // Searching must not create an empty database as a side effect.
        get_index_info(&state.store)?;
        let engine = SearchEngine::new(open_store(&state.store)?, state.dialect)?;
        let results = engine.search(&request)?;
        Ok(results.to_response())
    })
    .await?;
    Ok(Json(response))
}

async fn convert(Json(request): Json<ConvertRequest>) -> Result<Json<ConvertResponse>, ApiError> {
    let converted = convert_query(&request.query, request.dialect)
        .map_err(|err| ApiError::bad_request(format!("invalid query: {err}")))?;
    Ok(Json(ConvertResponse {
        dialect: request.dialect,
        native_query: converted.query,
        fields: converted.fields,
    }))
}

async fn index_documents(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexSummary>, ApiError> {
    let summary = blocking(move || {
        let mut store = open_store(&state.store)?;
        let indexed = store
            .index_documents(&request.documents)
            .map_err(|err| ApiError::bad_request(err.to_string()))?;
        info!(indexed, "indexed documents");
        Ok(store.summary()?)
    })
    .await?;
    Ok(Json(summary))
}

async fn index_info(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<IndexSummary>, ApiError> {
    let summary = blocking(move || Ok(get_index_info(&state.store)?)).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewDocument, QueryInput, StoreBackendKind};

    fn state_in(dir: &std::path::Path) -> Arc<ServerState> {
        Arc::new(ServerState {
            store: StoreConfig {
                backend: StoreBackendKind::Sqlite,
                path: dir.join("index.sqlite"),
            },
            dialect: Dialect::MysqlBoolean,
        })
    }

    fn documents() -> IndexRequest {
        IndexRequest {
            documents: vec![
                NewDocument {
                    content_type: "article".to_string(),
                    object_id: "1".to_string(),
                    text: "rust web framework".to_string(),
                },
                NewDocument {
                    content_type: "note".to_string(),
                    object_id: "2".to_string(),
                    text: "rust notes".to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok_status() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn documents_then_search() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let state = state_in(tmp.path());

        let Json(summary) = index_documents(State(state.clone()), Json(documents()))
            .await
            .expect("index summary");
        assert_eq!(summary.documents, 2);

        let request = SearchRequest::new("rust").models(["article"]);
        let Json(response) = search(State(state), Json(request))
            .await
            .expect("search response");
        assert_eq!(response.native_query, "+rust");
        assert_eq!(response.total_count, 1);
        assert_eq!(response.hits[0].object_id, "1");
    }

    #[tokio::test]
    async fn search_without_index_is_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = search(State(state_in(tmp.path())), Json(SearchRequest::new("rust")))
            .await
            .expect_err("expected error");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        assert!(!tmp.path().join("index.sqlite").exists());
    }

    #[tokio::test]
    async fn search_errors_map_to_bad_request() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let state = state_in(tmp.path());
        index_documents(State(state.clone()), Json(documents()))
            .await
            .expect("index summary");

        for request in [
            SearchRequest::new("\"unterminated"),
            SearchRequest::new("rust").models(["comment"]),
            SearchRequest::new("rust").order_by("title".parse().expect("order")),
        ] {
            let err = search(State(state.clone()), Json(request))
                .await
                .expect_err("expected error");
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn convert_endpoint_uses_requested_dialect() {
        let request = ConvertRequest {
            query: QueryInput::from("web (rust OR golang)"),
            dialect: Dialect::Lucene,
        };
        let Json(response) = convert(Json(request)).await.expect("convert");
        assert_eq!(response.native_query, "+web +(rust OR golang)");
        assert_eq!(response.dialect, Dialect::Lucene);
    }

    #[tokio::test]
    async fn info_endpoint_reports_missing_index() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = index_info(State(state_in(tmp.path())))
            .await
            .expect_err("expected error");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
