//! Trait definition for single-index search backends.
//!
//! The aggregator never talks to a search provider directly. It hands each
//! fan-out leg to a [`SearchBackend`], which executes one query against one
//! index and returns the decorated documents plus a total-count estimate.

use crate::error::SearchError;
use crate::filter::build_filter;
use crate::targets::TargetIndex;
use crate::types::{HighlightTags, QueryType, ScoredDocument, SearchMode, SearchRequest};

/// Fully resolved parameters for one index query.
///
/// Built once per request and shared by every fan-out leg.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    /// Free-text query.
    pub text: String,
    /// Maximum documents to return from this index.
    pub top: usize,
    /// Rendered filter expression, if any.
    pub filter: Option<String>,
    /// How query terms are combined.
    pub search_mode: SearchMode,
    /// Query syntax.
    pub query_type: QueryType,
    /// Fields to highlight.
    pub highlight_fields: Vec<String>,
    /// Highlight delimiters.
    pub highlight: HighlightTags,
}

impl IndexQuery {
    /// Resolve a request into index query parameters with the given cap.
    pub fn from_request(request: &SearchRequest, top: usize) -> Self {
        Self {
            text: request.query.clone(),
            top,
            filter: build_filter(&request.filters),
            search_mode: request.search_mode,
            query_type: request.query_type,
            highlight_fields: request.effective_highlight_fields(),
            highlight: request.highlight.clone(),
        }
    }
}

/// What one index returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexResponse {
    /// Documents in provider order.
    pub documents: Vec<ScoredDocument>,
    /// Provider's estimate of all matching documents, when reported.
    pub total_count: Option<u64>,
}

/// A single-index search client.
///
/// Implementations own transport, authentication and response decoding.
/// Failures are reported as [`SearchError::Backend`] so the aggregator can
/// record them against the target without aborting the other legs.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
pub trait SearchBackend: Send + Sync {
    /// Run `query` against `target`'s index.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when the request fails, the provider rejects
    /// it, or the response cannot be decoded.
    fn search(
        &self,
        target: &TargetIndex,
        query: &IndexQuery,
    ) -> impl std::future::Future<Output = Result<IndexResponse, SearchError>> + Send;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}
