//! The configured set of searchable targets.
//!
//! A [`TargetUniverse`] is built once from configuration and shared
//! read-only with the aggregator. It is both the lookup table for requested
//! target codes and the default fan-out set when a request names none.

use serde::{Deserialize, Serialize};

/// One independently searchable index (one per state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIndex {
    /// Short identifier callers use (e.g. `ia`).
    pub code: String,
    /// Human-readable name (e.g. `Iowa`).
    pub name: String,
    /// Name of the search index behind this target.
    pub index: String,
    /// Blob container the index is populated from. Informational only.
    #[serde(default)]
    pub container: String,
}

impl TargetIndex {
    /// Create a target with no container.
    pub fn new(code: impl Into<String>, name: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            index: index.into(),
            container: String::new(),
        }
    }

    /// Set the source container.
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }
}

/// Ordered collection of configured targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetUniverse {
    targets: Vec<TargetIndex>,
}

impl TargetUniverse {
    /// Wrap the configured targets, keeping their order.
    pub fn new(targets: Vec<TargetIndex>) -> Self {
        Self { targets }
    }

    /// Look up a target by code, ignoring ASCII case and surrounding spaces.
    pub fn resolve(&self, code: &str) -> Option<&TargetIndex> {
        let code = code.trim();
        self.targets
            .iter()
            .find(|t| t.code.eq_ignore_ascii_case(code))
    }

    /// Every configured code, in configured order.
    pub fn codes(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.code.clone()).collect()
    }

    /// Iterate over the configured targets.
    pub fn iter(&self) -> std::slice::Iter<'_, TargetIndex> {
        self.targets.iter()
    }

    /// Number of configured targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no target is configured.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl FromIterator<TargetIndex> for TargetUniverse {
    fn from_iter<I: IntoIterator<Item = TargetIndex>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TargetUniverse {
    type Item = &'a TargetIndex;
    type IntoIter = std::slice::Iter<'a, TargetIndex>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}
