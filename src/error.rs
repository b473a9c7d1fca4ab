//! Error types for the statesearch service.

use statesearch_fanout::SearchError;

/// Top-level error type for configuration, serving, and searching.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration file or environment error.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP server error (bind, serve).
    #[error("server error: {0}")]
    Server(String),

    /// Search error surfaced from the aggregator or backend.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ServiceError>;
