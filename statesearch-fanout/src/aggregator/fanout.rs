//! Core aggregator: concurrent multi-target fan-out with per-target failure
//! isolation, followed by a stable global ranking.

use std::sync::Arc;

use crate::backend::{IndexQuery, IndexResponse, SearchBackend};
use crate::error::SearchError;
use crate::targets::{TargetIndex, TargetUniverse};
use crate::types::{AggregateResult, ScoredDocument, SearchRequest, TargetOutcome, TargetSearchResult};

use super::merge::merge_ranked;

/// Fans searches out across configured targets.
///
/// Holds no state between calls: the target universe and default cap are
/// fixed at construction and only read afterwards.
#[derive(Debug)]
pub struct Aggregator<B> {
    backend: B,
    universe: Arc<TargetUniverse>,
    default_top: usize,
}

impl<B: SearchBackend> Aggregator<B> {
    /// Create an aggregator over `universe` using `backend` for each leg.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `default_top` is zero.
    pub fn new(
        backend: B,
        universe: impl Into<Arc<TargetUniverse>>,
        default_top: usize,
    ) -> Result<Self, SearchError> {
        if default_top == 0 {
            return Err(SearchError::Config(
                "default result cap must be greater than 0".into(),
            ));
        }
        Ok(Self {
            backend,
            universe: universe.into(),
            default_top,
        })
    }

    /// The configured targets.
    pub fn universe(&self) -> &TargetUniverse {
        &self.universe
    }

    /// Result cap used when a request does not set one.
    pub fn default_top(&self) -> usize {
        self.default_top
    }

    /// The backend each leg is sent to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Search every requested target and merge the results.
    ///
    /// # Pipeline
    ///
    /// 1. Default an empty target set to every configured target
    /// 2. Fan out one backend query per target concurrently
    /// 3. Record a [`TargetOutcome`] per target, in request order
    /// 4. Stable-sort all collected documents by score (descending)
    /// 5. Truncate to the result cap
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] only when there is nothing to fan out
    /// to, and [`SearchError::Validation`] for a zero result cap. Failures of
    /// individual targets are reported in the outcomes, never as an error.
    pub async fn aggregate(&self, request: SearchRequest) -> Result<AggregateResult, SearchError> {
        let targets = self.effective_targets(&request.targets)?;
        let top = self.effective_top(request.top)?;
        let query = IndexQuery::from_request(&request, top);

        tracing::info!(
            targets = %targets.join(","),
            top,
            backend = self.backend.name(),
            "executing multi-target search"
        );
        tracing::debug!(query = %query.text, filter = ?query.filter, "multi-target query");

        let legs = targets.iter().map(|code| self.run_leg(code, &query));
        // join_all yields in input order, whatever order the legs finish in.
        let finished = futures::future::join_all(legs).await;

        let mut outcomes = Vec::with_capacity(finished.len());
        let mut collected: Vec<ScoredDocument> = Vec::new();
        for (outcome, documents) in finished {
            outcomes.push(outcome);
            collected.extend(documents);
        }

        let (documents, total_results) = merge_ranked(collected, top);
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            total_results,
            returned = documents.len(),
            failed,
            "multi-target search completed"
        );

        Ok(AggregateResult {
            query: request.query,
            states_searched: targets,
            outcomes,
            total_results,
            documents,
        })
    }

    /// Search a single target.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for an unknown target or a zero
    /// result cap, and propagates the backend's error if the search fails.
    pub async fn search_target(
        &self,
        request: SearchRequest,
        code: &str,
    ) -> Result<TargetSearchResult, SearchError> {
        let top = self.effective_top(request.top)?;
        let target = self.resolve(code)?;
        let query = IndexQuery::from_request(&request, top);

        tracing::info!(state = %code.to_uppercase(), top, "executing search");
        tracing::debug!(query = %query.text, filter = ?query.filter, "single-target query");

        let response = self.backend.search(target, &query).await.map_err(|err| {
            tracing::error!(state = %code, error = %err, "search failed");
            err
        })?;

        tracing::info!(
            state = %code,
            results = response.documents.len(),
            "search completed"
        );

        Ok(TargetSearchResult {
            query: request.query,
            state: code.to_owned(),
            state_name: target.name.clone(),
            total_count: response.total_count,
            results_count: response.documents.len(),
            results: response.documents,
        })
    }

    /// Run one fan-out leg. Never fails: errors become a failure outcome.
    async fn run_leg(&self, code: &str, query: &IndexQuery) -> (TargetOutcome, Vec<ScoredDocument>) {
        match self.search_resolved(code, query).await {
            Ok((target, response)) => {
                tracing::debug!(state = %code, count = response.documents.len(), "target returned results");
                let outcome = TargetOutcome::Success {
                    state: code.to_owned(),
                    state_name: target.name.clone(),
                    results_count: response.documents.len(),
                    total_count: response.total_count,
                };
                (outcome, response.documents)
            }
            Err(err) => {
                tracing::warn!(state = %code, error = %err, "target search failed");
                let outcome = TargetOutcome::Failure {
                    state: code.to_owned(),
                    error: err.to_string(),
                };
                (outcome, Vec::new())
            }
        }
    }

    async fn search_resolved(
        &self,
        code: &str,
        query: &IndexQuery,
    ) -> Result<(&TargetIndex, IndexResponse), SearchError> {
        let target = self.resolve(code)?;
        let response = self.backend.search(target, query).await?;
        Ok((target, response))
    }

    fn resolve(&self, code: &str) -> Result<&TargetIndex, SearchError> {
        self.universe.resolve(code).ok_or_else(|| {
            SearchError::Validation(format!(
                "invalid state code: {code}. Valid codes: {}",
                self.universe.codes().join(", ")
            ))
        })
    }

    fn effective_targets(&self, requested: &[String]) -> Result<Vec<String>, SearchError> {
        let targets = if requested.is_empty() {
            self.universe.codes()
        } else {
            requested.to_vec()
        };
        if targets.is_empty() {
            return Err(SearchError::Config(
                "no search targets requested and none configured".into(),
            ));
        }
        Ok(targets)
    }

    fn effective_top(&self, requested: Option<usize>) -> Result<usize, SearchError> {
        match requested {
            None => Ok(self.default_top),
            Some(0) => Err(SearchError::Validation("top must be greater than 0".into())),
            Some(top) => Ok(top),
        }
    }
}
