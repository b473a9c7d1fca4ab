//! Core request, document, and outcome types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::filter::FilterMap;

/// Fields highlighted when the caller does not name any.
pub const DEFAULT_HIGHLIGHT_FIELDS: &[&str] = &["content", "metadata_title"];

/// Separator used when joining content highlight fragments.
const HIGHLIGHT_JOINER: &str = " ... ";

/// How the terms of a free-text query are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// A document matches if any term matches.
    #[default]
    Any,
    /// A document matches only if every term matches.
    All,
}

impl SearchMode {
    /// Wire name understood by the search provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            other => Err(SearchError::Validation(format!(
                "search_mode must be 'any' or 'all', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query syntax the provider should parse the query string with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Simple query syntax.
    #[default]
    Simple,
    /// Full Lucene query syntax.
    Full,
    /// Semantic ranking.
    Semantic,
}

impl QueryType {
    /// Wire name understood by the search provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Full => "full",
            Self::Semantic => "semantic",
        }
    }

    /// Parse a query type name, falling back to [`QueryType::Simple`] for
    /// anything unrecognised.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "full" => Self::Full,
            "semantic" => Self::Semantic,
            _ => Self::Simple,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delimiters wrapped around each highlighted match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightTags {
    /// Inserted before a match.
    pub pre: String,
    /// Inserted after a match.
    pub post: String,
}

impl Default for HighlightTags {
    fn default() -> Self {
        Self {
            pre: "<em>".to_owned(),
            post: "</em>".to_owned(),
        }
    }
}

/// A single document returned by one target index.
///
/// Built once per result row and never modified afterwards; merging only
/// reorders documents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Content snippet (a page of the source document).
    pub content: String,
    /// Relevance score assigned by the upstream index (higher is better).
    pub score: f64,
    /// Page number within the parent document.
    pub page_number: String,
    /// Identifier of the document this page belongs to.
    pub parent_document: String,
    /// Document category (policy, manual, ...).
    pub document_type: String,
    /// Title metadata.
    pub metadata_title: String,
    /// Creation date metadata, as reported by the index.
    pub metadata_creation_date: String,
    /// Storage path of the source blob.
    pub storage_path: String,
    /// Highlight fragments per field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<BTreeMap<String, Vec<String>>>,
    /// Content fragments joined with `" ... "`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_content: Option<String>,
    /// First highlighted title fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_title: Option<String>,
}

impl ScoredDocument {
    /// Attach highlight fragments and derive the convenience fields.
    ///
    /// An empty map leaves the document without highlights.
    pub fn with_highlights(mut self, highlights: BTreeMap<String, Vec<String>>) -> Self {
        if highlights.is_empty() {
            return self;
        }
        self.highlighted_content = highlights
            .get("content")
            .map(|fragments| fragments.join(HIGHLIGHT_JOINER));
        self.highlighted_title = highlights
            .get("metadata_title")
            .and_then(|fragments| fragments.first().cloned());
        self.highlights = Some(highlights);
        self
    }
}

/// Result of one fan-out leg. Exactly one is produced per requested target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    /// The target answered.
    Success {
        /// Target identifier as requested.
        state: String,
        /// Human-readable target name.
        state_name: String,
        /// Number of documents this target returned.
        results_count: usize,
        /// Provider's estimate of all matching documents.
        total_count: Option<u64>,
    },
    /// The target could not be searched.
    Failure {
        /// Target identifier as requested.
        state: String,
        /// Why the search failed. Never empty.
        error: String,
    },
}

impl TargetOutcome {
    /// Target identifier this outcome belongs to.
    pub fn state(&self) -> &str {
        match self {
            Self::Success { state, .. } | Self::Failure { state, .. } => state,
        }
    }

    /// Whether the target answered.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Combined response of a fan-out search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// The query, echoed back.
    pub query: String,
    /// Effective target set, after defaulting.
    pub states_searched: Vec<String>,
    /// One outcome per target, in request order.
    #[serde(rename = "state_summaries")]
    pub outcomes: Vec<TargetOutcome>,
    /// Documents collected across all successful targets, before truncation.
    pub total_results: usize,
    /// Merged documents, ranked by score and truncated to the result cap.
    #[serde(rename = "top_results")]
    pub documents: Vec<ScoredDocument>,
}

/// Response of a search against a single target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSearchResult {
    /// The query, echoed back.
    pub query: String,
    /// Target identifier as requested.
    pub state: String,
    /// Human-readable target name.
    pub state_name: String,
    /// Provider's estimate of all matching documents.
    pub total_count: Option<u64>,
    /// Number of documents returned.
    pub results_count: usize,
    /// Documents in provider order.
    pub results: Vec<ScoredDocument>,
}

/// A search to run against one or more targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Target identifiers. Empty means every configured target.
    pub targets: Vec<String>,
    /// Result cap. `None` uses the configured default.
    pub top: Option<usize>,
    /// Structured filter, rendered with [`crate::filter::build_filter`].
    pub filters: FilterMap,
    /// How query terms are combined.
    pub search_mode: SearchMode,
    /// Query syntax.
    pub query_type: QueryType,
    /// Fields to highlight. `None` uses [`DEFAULT_HIGHLIGHT_FIELDS`].
    pub highlight_fields: Option<Vec<String>>,
    /// Highlight delimiters.
    pub highlight: HighlightTags,
}

impl SearchRequest {
    /// Create a request for `query` with every other setting at its default.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Restrict the search to the given targets.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Set the result cap.
    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    /// Set the structured filter.
    pub fn with_filters(mut self, filters: FilterMap) -> Self {
        self.filters = filters;
        self
    }

    /// Set the search mode.
    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    /// Set the query type.
    pub fn with_query_type(mut self, query_type: QueryType) -> Self {
        self.query_type = query_type;
        self
    }

    /// Set the highlighted fields.
    pub fn with_highlight_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlight_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set the highlight delimiters.
    pub fn with_highlight_tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.highlight = HighlightTags {
            pre: pre.into(),
            post: post.into(),
        };
        self
    }

    /// Highlight fields to request, applying the default when unset.
    pub fn effective_highlight_fields(&self) -> Vec<String> {
        match &self.highlight_fields {
            Some(fields) => fields.clone(),
            None => DEFAULT_HIGHLIGHT_FIELDS
                .iter()
                .map(|f| (*f).to_owned())
                .collect(),
        }
    }
}
