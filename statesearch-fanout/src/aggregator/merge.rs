//! Global ranking of documents collected from several targets.

use std::cmp::Ordering;

use crate::types::ScoredDocument;

/// Sort documents by score (descending) and truncate to `cap`.
///
/// The sort is stable: documents with equal scores keep the order in which
/// they were collected (target order, then per-target result order).
/// Returns the ranked documents and the number collected before truncation.
pub fn merge_ranked(mut documents: Vec<ScoredDocument>, cap: usize) -> (Vec<ScoredDocument>, usize) {
    documents.sort_by(by_score_descending);
    let total = documents.len();
    documents.truncate(cap);
    (documents, total)
}

fn by_score_descending(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    b.score.total_cmp(&a.score)
}
