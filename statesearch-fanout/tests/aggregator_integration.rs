//! Integration tests for the fan-out aggregator.
//!
//! These tests drive the public API with in-memory backends (no network
//! calls). Delays are used to make legs complete out of request order.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use statesearch_fanout::{
    Aggregator, FilterMap, IndexQuery, IndexResponse, ScoredDocument, SearchBackend, SearchError,
    SearchRequest, TargetIndex, TargetOutcome, TargetUniverse,
};

/// Per-index behaviour for [`ScriptedBackend`].
#[derive(Clone)]
enum Script {
    Answer { scores: Vec<f64>, delay_ms: u64 },
    Fail { message: String, delay_ms: u64 },
}

#[derive(Default)]
struct ScriptedBackend {
    scripts: HashMap<String, Script>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    fn answer(mut self, index: &str, scores: &[f64], delay_ms: u64) -> Self {
        self.scripts.insert(
            index.to_owned(),
            Script::Answer {
                scores: scores.to_vec(),
                delay_ms,
            },
        );
        self
    }

    fn fail(mut self, index: &str, message: &str, delay_ms: u64) -> Self {
        self.scripts.insert(
            index.to_owned(),
            Script::Fail {
                message: message.to_owned(),
                delay_ms,
            },
        );
        self
    }
}

impl SearchBackend for ScriptedBackend {
    async fn search(
        &self,
        target: &TargetIndex,
        query: &IndexQuery,
    ) -> Result<IndexResponse, SearchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let script = self
            .scripts
            .get(&target.index)
            .cloned()
            .unwrap_or(Script::Fail {
                message: "index not found".into(),
                delay_ms: 0,
            });

        let result = match script {
            Script::Answer { scores, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                let documents: Vec<ScoredDocument> = scores
                    .iter()
                    .take(query.top)
                    .enumerate()
                    .map(|(i, score)| ScoredDocument {
                        parent_document: format!("{}#{}", target.code, i + 1),
                        score: *score,
                        metadata_title: format!("{} document {}", target.name, i + 1),
                        ..Default::default()
                    })
                    .collect();
                Ok(IndexResponse {
                    total_count: Some(scores.len() as u64),
                    documents,
                })
            }
            Script::Fail { message, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Err(SearchError::backend(&target.index, message))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn six_states() -> TargetUniverse {
    TargetUniverse::new(vec![
        TargetIndex::new("ia", "Iowa", "ia-index"),
        TargetIndex::new("in", "Indiana", "in-index"),
        TargetIndex::new("oh", "Ohio", "oh-index"),
        TargetIndex::new("tx", "Texas", "tx-index"),
        TargetIndex::new("va", "Virginia", "va-index"),
        TargetIndex::new("wa", "Washington", "wa-index"),
    ])
}

fn ids(docs: &[ScoredDocument]) -> Vec<&str> {
    docs.iter().map(|d| d.parent_document.as_str()).collect()
}

#[tokio::test]
async fn outcomes_follow_request_order_not_completion_order() {
    // Earlier targets are slower, so legs complete in reverse order.
    let backend = ScriptedBackend::default()
        .answer("ia-index", &[0.5], 60)
        .answer("in-index", &[0.5], 40)
        .answer("oh-index", &[0.5], 20)
        .answer("tx-index", &[0.5], 0);
    let agg = Aggregator::new(backend, six_states(), 10).unwrap();

    let result = agg
        .aggregate(SearchRequest::new("q").with_targets(["ia", "in", "oh", "tx"]))
        .await
        .unwrap();

    let states: Vec<&str> = result.outcomes.iter().map(TargetOutcome::state).collect();
    assert_eq!(states, vec!["ia", "in", "oh", "tx"]);
    // Equal scores keep target order even though "tx" finished first.
    assert_eq!(ids(&result.documents), vec!["ia#1", "in#1", "oh#1", "tx#1"]);
}

#[tokio::test]
async fn legs_run_concurrently() {
    let backend = ScriptedBackend::default()
        .answer("ia-index", &[0.1], 50)
        .answer("in-index", &[0.1], 50)
        .answer("oh-index", &[0.1], 50);
    let agg = Aggregator::new(backend, six_states(), 10).unwrap();

    agg.aggregate(SearchRequest::new("q").with_targets(["ia", "in", "oh"]))
        .await
        .unwrap();

    assert_eq!(agg.backend().peak_in_flight.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn slow_failure_does_not_block_other_results() {
    let backend = ScriptedBackend::default()
        .fail("ia-index", "HTTP 503: service unavailable", 30)
        .answer("in-index", &[0.7, 0.6], 0);
    let agg = Aggregator::new(backend, six_states(), 10).unwrap();

    let result = agg
        .aggregate(SearchRequest::new("q").with_targets(["ia", "in"]))
        .await
        .unwrap();

    match &result.outcomes[0] {
        TargetOutcome::Failure { state, error } => {
            assert_eq!(state, "ia");
            assert!(error.contains("HTTP 503"), "unexpected error: {error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(result.outcomes[1].is_success());
    assert_eq!(ids(&result.documents), vec!["in#1", "in#2"]);
}

#[tokio::test]
async fn every_target_failing_is_still_a_result() {
    let backend = ScriptedBackend::default()
        .fail("ia-index", "authentication failed", 0)
        .fail("in-index", "authentication failed", 0);
    let agg = Aggregator::new(backend, six_states(), 10).unwrap();

    let result = agg
        .aggregate(SearchRequest::new("q").with_targets(["ia", "in"]))
        .await
        .unwrap();

    assert_eq!(result.outcomes.len(), 2);
    assert!(result.outcomes.iter().all(|o| !o.is_success()));
    assert!(result.documents.is_empty());
    assert_eq!(result.total_results, 0);
}

#[tokio::test]
async fn outcome_count_matches_targets_for_many_subsets() {
    let backend = ScriptedBackend::default()
        .answer("ia-index", &[0.9, 0.3], 0)
        .answer("oh-index", &[0.6], 0)
        .fail("tx-index", "timeout", 0)
        .answer("wa-index", &[0.9, 0.8, 0.1], 0);
    let agg = Aggregator::new(backend, six_states(), 3).unwrap();

    let subsets: Vec<Vec<&str>> = vec![
        vec!["ia"],
        vec!["zz"],
        vec!["ia", "oh"],
        vec!["tx", "wa", "zz"],
        vec!["wa", "ia", "oh", "in"],
        vec!["ia", "in", "oh", "tx", "va", "wa"],
    ];

    for subset in subsets {
        let result = agg
            .aggregate(SearchRequest::new("q").with_targets(subset.clone()))
            .await
            .unwrap();
        let states: Vec<&str> = result.outcomes.iter().map(TargetOutcome::state).collect();
        assert_eq!(states, subset, "outcomes must mirror the request");
        assert!(result.documents.len() <= 3);
        assert!(result.total_results >= result.documents.len());
        for pair in result.documents.windows(2) {
            assert!(pair[0].score >= pair[1].score, "documents not ranked");
        }
    }
}

#[tokio::test]
async fn cap_is_reached_when_enough_documents_exist() {
    let backend = ScriptedBackend::default()
        .answer("ia-index", &[0.9, 0.5], 0)
        .answer("in-index", &[0.9], 0);
    let agg = Aggregator::new(backend, six_states(), 10).unwrap();

    let result = agg
        .aggregate(
            SearchRequest::new("q")
                .with_targets(["ia", "in"])
                .with_top(2),
        )
        .await
        .unwrap();

    assert_eq!(ids(&result.documents), vec!["ia#1", "in#1"]);
    assert_eq!(result.total_results, 3);
}

#[tokio::test]
async fn per_target_cap_is_the_request_cap() {
    let backend = ScriptedBackend::default().answer("ia-index", &[0.9, 0.8, 0.7, 0.6], 0);
    let agg = Aggregator::new(backend, six_states(), 10).unwrap();

    let result = agg
        .aggregate(SearchRequest::new("q").with_targets(["ia"]).with_top(2))
        .await
        .unwrap();

    match &result.outcomes[0] {
        TargetOutcome::Success {
            results_count,
            total_count,
            ..
        } => {
            assert_eq!(*results_count, 2);
            assert_eq!(*total_count, Some(4));
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn filters_reach_every_leg_rendered() {
    struct FilterProbe;

    impl SearchBackend for FilterProbe {
        async fn search(
            &self,
            target: &TargetIndex,
            query: &IndexQuery,
        ) -> Result<IndexResponse, SearchError> {
            if query.filter.as_deref() != Some("document_type eq 'policy' and page_number ge 3") {
                return Err(SearchError::backend(&target.index, "unexpected filter"));
            }
            Ok(IndexResponse::default())
        }

        fn name(&self) -> &str {
            "probe"
        }
    }

    let filters: FilterMap =
        serde_json::from_str(r#"{"document_type": "policy", "page_number": {"gte": 3}}"#).unwrap();
    let agg = Aggregator::new(FilterProbe, six_states(), 5).unwrap();
    let result = agg
        .aggregate(SearchRequest::new("q").with_filters(filters))
        .await
        .unwrap();

    assert_eq!(result.outcomes.len(), 6);
    assert!(result.outcomes.iter().all(TargetOutcome::is_success));
}
