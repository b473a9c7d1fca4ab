//! # statesearch
//!
//! Query API that fans full-text searches out across per-state Azure AI
//! Search indexes and merges the results by relevance.
//!
//! The fan-out, filter rendering and ranking live in `statesearch-fanout`.
//! This crate supplies the pieces around it:
//!
//! - [`azure`]: the Azure AI Search REST backend
//! - [`config`]: TOML configuration with environment overrides
//! - [`server`]: the HTTP API

pub mod azure;
pub mod config;
pub mod error;
pub mod server;

pub use azure::{AzureSearchBackend, AzureSearchConfig};
pub use config::{SearchSettings, ServerConfig, ServiceConfig};
pub use error::{Result, ServiceError};
pub use server::SearchServer;
pub use statesearch_fanout as fanout;

use statesearch_fanout::Aggregator;

/// Build an aggregator over the configured targets backed by Azure AI Search.
///
/// # Errors
///
/// Returns [`ServiceError::Config`] if the endpoint is missing or invalid,
/// and [`ServiceError::Search`] if the result cap is rejected.
pub fn build_aggregator(config: &ServiceConfig) -> Result<Aggregator<AzureSearchBackend>> {
    let backend = AzureSearchBackend::new(config.backend_config()?)?;
    if config.targets.is_empty() {
        tracing::warn!("no search targets configured");
    }
    Ok(Aggregator::new(
        backend,
        config.universe(),
        config.search.top_k,
    )?)
}
