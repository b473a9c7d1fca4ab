//! # statesearch-fanout
//!
//! Fan-out search across independent per-state search indexes.
//!
//! ## Design
//!
//! - One query is sent to every requested target concurrently
//! - A target that fails is reported in its own outcome; the others still
//!   contribute results
//! - Results from all targets are merged by relevance score with a stable
//!   sort, so equal scores never reorder between runs
//! - The set of valid targets is injected at construction, never read from
//!   global state
//!
//! The crate contains no transport code. Provider access goes through the
//! [`SearchBackend`] trait.
//!
//! ## Example
//!
//! ```no_run
//! # use statesearch_fanout::{Aggregator, SearchBackend, SearchRequest, TargetIndex, TargetUniverse};
//! # async fn example<B: SearchBackend>(backend: B) -> statesearch_fanout::Result<()> {
//! let universe = TargetUniverse::new(vec![
//!     TargetIndex::new("ia", "Iowa", "ia-medicaid-index"),
//!     TargetIndex::new("oh", "Ohio", "oh-medicaid-index"),
//! ]);
//! let aggregator = Aggregator::new(backend, universe, 5)?;
//! let result = aggregator
//!     .aggregate(SearchRequest::new("medicaid eligibility").with_top(10))
//!     .await?;
//! for doc in &result.documents {
//!     println!("{:.3} {}", doc.score, doc.metadata_title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod backend;
pub mod error;
pub mod filter;
pub mod targets;
pub mod types;

pub use aggregator::Aggregator;
pub use backend::{IndexQuery, IndexResponse, SearchBackend};
pub use error::{Result, SearchError};
pub use filter::{build_filter, FilterMap, FilterValue, RangeBounds};
pub use targets::{TargetIndex, TargetUniverse};
pub use types::{
    AggregateResult, HighlightTags, QueryType, ScoredDocument, SearchMode, SearchRequest,
    TargetOutcome, TargetSearchResult,
};
