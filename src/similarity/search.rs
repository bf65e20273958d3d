//! Top-N selection over a [`Matrix`].
//!
//! Both implementations are exact. Ordering is score descending with ties broken by row
//! index ascending, which is what a stable descending sort produces. Inputs must be finite;
//! the store and the engine reject non-finite vectors before they get here.

use std::cmp::Ordering;
use std::fmt::Debug;

use super::{Matrix, clipped_cosine};

/// A scored matrix row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub index: usize,
    pub score: f32,
}

#[inline]
fn rank_order(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.index.cmp(&b.index))
}

#[inline]
fn score_rows(matrix: &Matrix, query: &[f32]) -> Vec<Hit> {
    matrix
        .iter_rows()
        .enumerate()
        .map(|(index, row)| Hit {
            index,
            score: clipped_cosine(query, row),
        })
        .collect()
}

/// Exact similarity search capability.
pub trait SimilaritySearch: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// The `n` best rows of `matrix` for a unit-length `query`.
    fn top_n(&self, matrix: &Matrix, query: &[f32], n: usize) -> Vec<Hit>;

    /// Highest row score, or `None` for an empty matrix.
    fn best_score(&self, matrix: &Matrix, query: &[f32]) -> Option<f32> {
        matrix
            .iter_rows()
            .map(|row| clipped_cosine(query, row))
            .reduce(f32::max)
    }
}

/// Scores every row and sorts the whole list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForce;

impl SimilaritySearch for BruteForce {
    fn name(&self) -> &'static str {
        "brute_force"
    }

    fn top_n(&self, matrix: &Matrix, query: &[f32], n: usize) -> Vec<Hit> {
        let mut hits = score_rows(matrix, query);
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(n);
        hits
    }
}

/// Partitions around the n-th best row and only sorts the selected prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexAccelerated;

impl SimilaritySearch for IndexAccelerated {
    fn name(&self) -> &'static str {
        "index_accelerated"
    }

    fn top_n(&self, matrix: &Matrix, query: &[f32], n: usize) -> Vec<Hit> {
        if n == 0 {
            return Vec::new();
        }
        let mut hits = score_rows(matrix, query);
        if n < hits.len() {
            hits.select_nth_unstable_by(n - 1, rank_order);
            hits.truncate(n);
        }
        hits.sort_unstable_by(rank_order);
        hits
    }

    fn best_score(&self, matrix: &Matrix, query: &[f32]) -> Option<f32> {
        self.top_n(matrix, query, 1).first().map(|hit| hit.score)
    }
}

static BRUTE_FORCE: BruteForce = BruteForce;
static INDEX_ACCELERATED: IndexAccelerated = IndexAccelerated;

/// Picks the search implementation for a query.
pub fn search_for(accelerate: bool) -> &'static dyn SimilaritySearch {
    if accelerate {
        &INDEX_ACCELERATED
    } else {
        &BRUTE_FORCE
    }
}
