//! Fan-out aggregator: concurrent per-target search, merge, rank.
//!
//! This module fans a query out to every requested target, isolates
//! failures per target, and merges successful results into one ranked,
//! truncated result set.

pub mod fanout;
pub mod merge;

pub use fanout::Aggregator;
pub use merge::merge_ranked;
