//! Azure AI Search backend.
//!
//! Sends one REST query per index:
//! `POST {endpoint}/indexes/{index}/docs/search?api-version=...`
//!
//! # Example
//!
//! ```no_run
//! use statesearch::azure::{AzureSearchBackend, AzureSearchConfig};
//!
//! # fn example() -> statesearch::Result<()> {
//! let config = AzureSearchConfig::new("https://example.search.windows.net")
//!     .with_api_key("query-key");
//! let backend = AzureSearchBackend::new(config)?;
//! # let _ = backend;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use statesearch_fanout::{
    IndexQuery, IndexResponse, ScoredDocument, SearchBackend, SearchError, TargetIndex,
};
use url::Url;

use crate::error::{Result, ServiceError};

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "2024-07-01";

/// Fields retrieved for every result row.
pub const SELECT_FIELDS: &[&str] = &[
    "content",
    "metadata_storage_path",
    "page_number",
    "parent_document",
    "document_type",
    "metadata_title",
    "metadata_creation_date",
];

/// Connection settings for an Azure AI Search service.
#[derive(Clone)]
pub struct AzureSearchConfig {
    /// Service endpoint, e.g. `https://<service>.search.windows.net`.
    pub endpoint: String,
    /// Value of the `api-key` header, if any.
    pub api_key: Option<String>,
    /// REST API version.
    pub api_version: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for AzureSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AzureSearchConfig {
    /// Create a config for `endpoint` with no key and default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            api_version: DEFAULT_API_VERSION.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the REST API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`SearchBackend`] for Azure AI Search indexes.
pub struct AzureSearchBackend {
    config: AzureSearchConfig,
    endpoint: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureSearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSearchBackend")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_version", &self.config.api_version)
            .finish()
    }
}

impl AzureSearchBackend {
    /// Create a backend from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if the endpoint is not an absolute
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(config: AzureSearchConfig) -> Result<Self> {
        let endpoint = Url::parse(config.endpoint.trim()).map_err(|e| {
            ServiceError::Config(format!("invalid search endpoint '{}': {e}", config.endpoint))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(ServiceError::Config(format!(
                "search endpoint must be an http(s) URL, got '{}'",
                config.endpoint
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    /// The connection settings.
    pub fn config(&self) -> &AzureSearchConfig {
        &self.config
    }

    /// Query URL for `index`.
    pub fn search_url(&self, index: &str) -> Url {
        let mut url = self.endpoint.clone();
        // Base URLs are checked in `new`, so path segments are always available.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["indexes", index, "docs", "search"]);
        }
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        url
    }

    /// Map an HTTP error status to a backend error for `index`.
    fn map_http_error(index: &str, status: reqwest::StatusCode, body: &str) -> SearchError {
        let message = extract_error_message(body);
        let detail = match status.as_u16() {
            401 | 403 => format!("authentication failed: {message}"),
            404 => format!("index not found: {message}"),
            code => format!("HTTP {code}: {message}"),
        };
        SearchError::backend(index, detail)
    }
}

/// Build the JSON request body for one index query.
pub fn build_search_body(query: &IndexQuery) -> Value {
    let mut body = serde_json::json!({
        "search": query.text,
        "top": query.top,
        "count": true,
        "searchMode": query.search_mode.as_str(),
        "queryType": query.query_type.as_str(),
        "select": SELECT_FIELDS.join(","),
    });
    if let Some(filter) = &query.filter {
        body["filter"] = Value::String(filter.clone());
    }
    if !query.highlight_fields.is_empty() {
        body["highlight"] = Value::String(query.highlight_fields.join(","));
        body["highlightPreTag"] = Value::String(query.highlight.pre.clone());
        body["highlightPostTag"] = Value::String(query.highlight.post.clone());
    }
    body
}

/// Extract an error message from an Azure error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_owned()
            } else {
                trimmed.to_owned()
            }
        })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "@odata.count")]
    count: Option<u64>,
    #[serde(default)]
    value: Vec<Map<String, Value>>,
}

/// Convert one result row into a document.
fn row_to_document(row: &Map<String, Value>) -> ScoredDocument {
    let text = |field: &str| row.get(field).map(value_text).unwrap_or_default();
    let document = ScoredDocument {
        content: text("content"),
        score: row
            .get("@search.score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        page_number: text("page_number"),
        parent_document: text("parent_document"),
        document_type: text("document_type"),
        metadata_title: text("metadata_title"),
        metadata_creation_date: text("metadata_creation_date"),
        storage_path: text("metadata_storage_path"),
        ..Default::default()
    };

    let highlights: BTreeMap<String, Vec<String>> = row
        .get("@search.highlights")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(field, fragments)| {
                    let fragments: Vec<String> = fragments
                        .as_array()
                        .map(|items| items.iter().map(value_text).collect())
                        .unwrap_or_default();
                    (field.clone(), fragments)
                })
                .collect()
        })
        .unwrap_or_default();

    document.with_highlights(highlights)
}

/// Render a field value as text. Null becomes empty.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl SearchBackend for AzureSearchBackend {
    async fn search(
        &self,
        target: &TargetIndex,
        query: &IndexQuery,
    ) -> std::result::Result<IndexResponse, SearchError> {
        let url = self.search_url(&target.index);
        let body = build_search_body(query);

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            let detail = if e.is_timeout() {
                format!("request timed out after {:?}", self.config.timeout)
            } else {
                format!("request failed: {e}")
            };
            SearchError::backend(&target.index, detail)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(&target.index, status, &body_text));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            SearchError::backend(&target.index, format!("invalid response body: {e}"))
        })?;

        tracing::debug!(
            index = %target.index,
            rows = parsed.value.len(),
            count = ?parsed.count,
            "index query returned"
        );

        Ok(IndexResponse {
            documents: parsed.value.iter().map(row_to_document).collect(),
            total_count: parsed.count,
        })
    }

    fn name(&self) -> &str {
        "azure"
    }
}
