//! Error types for the statesearch-fanout crate.
//!
//! Error messages are stable strings suitable for returning to API callers.
//! No credentials or request bodies appear in error messages.

/// Errors that can occur while searching one or more target indexes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Nothing to fan out to, or an invalid service-side setting.
    #[error("config error: {0}")]
    Config(String),

    /// A single target's search failed (transport, auth, or query error).
    #[error("search failed for '{index}': {message}")]
    Backend {
        /// Target identifier or index name the failure belongs to.
        index: String,
        /// Provider or transport error description.
        message: String,
    },

    /// The request is malformed and was rejected before any search ran.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl SearchError {
    /// Build a [`SearchError::Backend`] for the given index.
    pub fn backend(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Whether the caller is at fault (as opposed to the service or provider).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Convenience type alias for statesearch-fanout results.
pub type Result<T> = std::result::Result<T, SearchError>;
