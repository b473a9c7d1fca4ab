//! HTTP API over the fan-out aggregator.
//!
//! ## Endpoints
//!
//! - `POST /api/search`: search one state
//! - `POST /api/search/multi-state`: search several states and merge by score
//! - `GET /api/search/states`: list configured states
//! - `GET /api/health`: liveness probe

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use statesearch_fanout::{
    AggregateResult, Aggregator, FilterMap, QueryType, SearchBackend, SearchError, SearchMode,
    SearchRequest, TargetIndex, TargetSearchResult,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{Result, ServiceError};

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "State Search Query API";

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchBody {
    /// Free-text query. Required.
    #[serde(default)]
    pub query: Option<String>,
    /// State code. Required.
    #[serde(default)]
    pub state: Option<String>,
    /// Result cap.
    #[serde(default)]
    pub top: Option<usize>,
    /// Structured filter.
    #[serde(default)]
    pub filters: Option<FilterMap>,
    /// `any` or `all`.
    #[serde(default)]
    pub search_mode: Option<String>,
    /// `simple`, `full` or `semantic`.
    #[serde(default)]
    pub query_type: Option<String>,
    /// Fields to highlight.
    #[serde(default)]
    pub highlight_fields: Option<Vec<String>>,
    /// Inserted before each highlighted match.
    #[serde(default)]
    pub highlight_pre_tag: Option<String>,
    /// Inserted after each highlighted match.
    #[serde(default)]
    pub highlight_post_tag: Option<String>,
}

/// Body of `POST /api/search/multi-state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiStateBody {
    /// Free-text query. Required.
    #[serde(default)]
    pub query: Option<String>,
    /// State codes. Absent or empty means all configured states.
    #[serde(default)]
    pub states: Option<Vec<String>>,
    /// Result cap, applied per state and to the merged list.
    #[serde(default)]
    pub top: Option<usize>,
    /// Structured filter.
    #[serde(default)]
    pub filters: Option<FilterMap>,
    /// `any` or `all`.
    #[serde(default)]
    pub search_mode: Option<String>,
    /// `simple`, `full` or `semantic`.
    #[serde(default)]
    pub query_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response of `GET /api/search/states`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatesResponse {
    /// Number of configured states.
    pub total_states: usize,
    /// Configured states in configuration order.
    pub states: Vec<TargetIndex>,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"`.
    pub status: String,
    /// Service name.
    pub service: String,
}

/// Error body: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

/// An error returned from a handler.
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

    fn from_rejection(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                Self::bad_request(format!("invalid request body: {}", err.body_text()))
            }
            other => {
                tracing::debug!(rejection = %other.body_text(), "rejected request body");
                Self::bad_request("Request must be JSON")
            }
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
struct AppState<B> {
    aggregator: Arc<Aggregator<B>>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            aggregator: Arc::clone(&self.aggregator),
        }
    }
}

/// Build the API router over `aggregator`.
pub fn router<B: SearchBackend + 'static>(aggregator: Arc<Aggregator<B>>) -> Router {
    Router::new()
        .route("/api/search", post(handle_search::<B>))
        .route("/api/search/multi-state", post(handle_multi_state::<B>))
        .route("/api/search/states", get(handle_states::<B>))
        .route("/api/health", get(handle_health))
        .with_state(AppState { aggregator })
}

// ---------------------------------------------------------------------------
// SearchServer
// ---------------------------------------------------------------------------

/// The HTTP API running in a background task.
pub struct SearchServer {
    /// The address the server is listening on.
    addr: SocketAddr,
    /// Handle to the background server task.
    handle: JoinHandle<()>,
}

impl SearchServer {
    /// Start the HTTP API.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign)
    /// and begins serving in a background tokio task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start<B: SearchBackend + 'static>(
        aggregator: Arc<Aggregator<B>>,
        config: &ServerConfig,
    ) -> Result<Self> {
        let app = router(aggregator);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ServiceError::Server(format!("bind to {bind_addr} failed: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| ServiceError::Server(format!("failed to get local addr: {e}")))?;

        info!("search API listening on http://{addr}/api");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("search API error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the server task to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked.
    pub async fn wait(&mut self) -> Result<()> {
        match (&mut self.handle).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(ServiceError::Server(format!("server task failed: {e}"))),
        }
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for SearchServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Trimmed, non-empty value of an optional string field.
fn required(field: Option<String>) -> Option<String> {
    field
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Apply the query options shared by both search endpoints.
fn with_query_options(
    mut request: SearchRequest,
    top: Option<usize>,
    filters: Option<FilterMap>,
    search_mode: Option<&str>,
    query_type: Option<&str>,
) -> std::result::Result<SearchRequest, SearchError> {
    request.top = top;
    if let Some(filters) = filters {
        request.filters = filters;
    }
    if let Some(mode) = search_mode {
        request.search_mode = mode.parse::<SearchMode>()?;
    }
    if let Some(query_type) = query_type {
        request.query_type = QueryType::from_name(query_type);
    }
    Ok(request)
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `POST /api/search`: search one state.
async fn handle_search<B: SearchBackend + 'static>(
    State(state): State<AppState<B>>,
    body: std::result::Result<Json<SearchBody>, JsonRejection>,
) -> std::result::Result<Json<TargetSearchResult>, ApiError> {
    let Json(body) = body.map_err(ApiError::from_rejection)?;

    let (Some(query), Some(code)) = (required(body.query), required(body.state)) else {
        return Err(ApiError::bad_request(
            "Both 'query' and 'state' are required",
        ));
    };

    let mut request = with_query_options(
        SearchRequest::new(query),
        body.top,
        body.filters,
        body.search_mode.as_deref(),
        body.query_type.as_deref(),
    )?;
    if let Some(fields) = body.highlight_fields {
        request = request.with_highlight_fields(fields);
    }
    if let Some(pre) = body.highlight_pre_tag {
        request.highlight.pre = pre;
    }
    if let Some(post) = body.highlight_post_tag {
        request.highlight.post = post;
    }

    let result = state.aggregator.search_target(request, &code).await?;
    Ok(Json(result))
}

/// `POST /api/search/multi-state`: fan out and merge.
async fn handle_multi_state<B: SearchBackend + 'static>(
    State(state): State<AppState<B>>,
    body: std::result::Result<Json<MultiStateBody>, JsonRejection>,
) -> std::result::Result<Json<AggregateResult>, ApiError> {
    let Json(body) = body.map_err(ApiError::from_rejection)?;

    let Some(query) = required(body.query) else {
        return Err(ApiError::bad_request("'query' is required"));
    };

    let request = with_query_options(
        SearchRequest::new(query).with_targets(body.states.unwrap_or_default()),
        body.top,
        body.filters,
        body.search_mode.as_deref(),
        body.query_type.as_deref(),
    )?;

    let result = state.aggregator.aggregate(request).await?;
    Ok(Json(result))
}

/// `GET /api/search/states`: list configured states.
async fn handle_states<B: SearchBackend + 'static>(
    State(state): State<AppState<B>>,
) -> Json<StatesResponse> {
    let states: Vec<TargetIndex> = state.aggregator.universe().iter().cloned().collect();
    Json(StatesResponse {
        total_states: states.len(),
        states,
    })
}

/// `GET /api/health`: liveness probe.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_owned(),
        service: SERVICE_NAME.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use statesearch_fanout::{IndexQuery, IndexResponse, ScoredDocument, TargetUniverse};

    /// Returns one document per state scored by index name length; fails for "broken".
    struct StubBackend;

    impl SearchBackend for StubBackend {
        async fn search(
            &self,
            target: &TargetIndex,
            query: &IndexQuery,
        ) -> std::result::Result<IndexResponse, SearchError> {
            if target.index == "broken" {
                return Err(SearchError::backend(&target.index, "HTTP 503: unavailable"));
            }
            Ok(IndexResponse {
                documents: vec![ScoredDocument {
                    content: format!("{} [{}]", query.text, query.search_mode),
                    score: target.index.len() as f64,
                    parent_document: format!("{}#1", target.code),
                    ..Default::default()
                }],
                total_count: Some(1),
            })
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    async fn start() -> SearchServer {
        let universe = TargetUniverse::new(vec![
            TargetIndex::new("ia", "Iowa", "ia-index").with_container("ia-docs"),
            TargetIndex::new("oh", "Ohio", "ohio-index"),
            TargetIndex::new("tx", "Texas", "broken"),
        ]);
        let aggregator = Arc::new(Aggregator::new(StubBackend, universe, 5).unwrap());
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        };
        SearchServer::start(aggregator, &config).await.unwrap()
    }

    fn url(server: &SearchServer, path: &str) -> String {
        format!("http://{}{path}", server.addr())
    }

    #[tokio::test]
    async fn server_binds_auto_port() {
        let server = start().await;
        assert_ne!(server.port(), 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let server = start().await;
        let body: HealthResponse = reqwest::get(url(&server, "/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, SERVICE_NAME);
    }

    #[tokio::test]
    async fn states_lists_configuration_order() {
        let server = start().await;
        let body: serde_json::Value = reqwest::get(url(&server, "/api/search/states"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["total_states"], 3);
        assert_eq!(body["states"][0]["code"], "ia");
        assert_eq!(body["states"][0]["container"], "ia-docs");
        assert_eq!(body["states"][2]["index"], "broken");
    }

    #[tokio::test]
    async fn search_requires_query_and_state() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/api/search"))
            .json(&serde_json::json!({"query": "  ", "state": "ia"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorResponse = response.json().await.unwrap();
        assert_eq!(body.error, "Both 'query' and 'state' are required");
    }

    #[tokio::test]
    async fn search_rejects_bad_search_mode() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/api/search"))
            .json(&serde_json::json!({"query": "q", "state": "ia", "search_mode": "most"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn search_applies_mode() {
        let server = start().await;
        let body: serde_json::Value = reqwest::Client::new()
            .post(url(&server, "/api/search"))
            .json(&serde_json::json!({"query": "q", "state": "IA", "search_mode": "all"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["state_name"], "Iowa");
        assert_eq!(body["results"][0]["content"], "q [all]");
    }

    #[tokio::test]
    async fn non_json_body_rejected() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/api/search/multi-state"))
            .header("content-type", "text/plain")
            .body("query=q")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorResponse = response.json().await.unwrap();
        assert_eq!(body.error, "Request must be JSON");
    }

    #[tokio::test]
    async fn wrongly_typed_field_is_reported() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/api/search/multi-state"))
            .json(&serde_json::json!({"query": "q", "top": "ten"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorResponse = response.json().await.unwrap();
        assert!(body.error.starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn multi_state_merges_and_isolates_failure() {
        let server = start().await;
        let body: serde_json::Value = reqwest::Client::new()
            .post(url(&server, "/api/search/multi-state"))
            .json(&serde_json::json!({"query": "q"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["states_searched"], serde_json::json!(["ia", "oh", "tx"]));
        assert_eq!(body["state_summaries"][2]["status"], "failure");
        assert_eq!(body["total_results"], 2);
        // "ohio-index" is longer than "ia-index", so it ranks first.
        assert_eq!(body["top_results"][0]["parent_document"], "oh#1");
    }

    #[tokio::test]
    async fn dropping_server_stops_it() {
        let server = start().await;
        let addr = server.addr();
        drop(server);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
