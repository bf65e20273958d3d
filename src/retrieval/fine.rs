use std::cmp::Ordering;

use tracing::{debug, warn};

use super::types::ScoreItem;
use crate::similarity::SimilaritySearch;
use crate::store::ClassBank;

#[derive(Debug, Clone, PartialEq)]
pub struct FineRanking {
    /// Descending by score; ties keep candidate order.
    pub items: Vec<ScoreItem>,
    /// Candidates with no samples in the bank.
    pub skipped: usize,
}

/// Scores each candidate class by its best-matching sample.
pub fn rank<'a>(
    bank: &ClassBank,
    candidates: impl IntoIterator<Item = &'a str>,
    query: &[f32],
    search: &dyn SimilaritySearch,
) -> FineRanking {
    let mut items = Vec::new();
    let mut skipped = 0usize;

    for label in candidates {
        let Some(samples) = bank.get(label) else {
            warn!(class = %label, "Inconsistent bank: shortlisted class has no samples, skipping");
            skipped += 1;
            continue;
        };
        if let Some(score) = search.best_score(samples, query) {
            items.push(ScoreItem::new(label, score));
        }
    }

    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    debug!(
        ranked = items.len(),
        skipped,
        top = items.first().map(|i| i.score),
        "Fine ranking"
    );

    FineRanking { items, skipped }
}
