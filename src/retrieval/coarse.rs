use tracing::debug;

use crate::similarity::SimilaritySearch;
use crate::store::CentroidIndex;

/// Classes kept by the coarse stage, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortlist<'a> {
    pub labels: Vec<&'a str>,
    /// Best centroid score ("coarse confidence").
    pub max_score: f32,
}

/// Ranks centroids against `query` and keeps the `top_c` best.
///
/// Returns `None` for an empty index; the caller then scans the whole bank.
pub fn shortlist<'a>(
    centroids: &'a CentroidIndex,
    query: &[f32],
    top_c: usize,
    search: &dyn SimilaritySearch,
) -> Option<Shortlist<'a>> {
    if centroids.is_empty() {
        return None;
    }

    let hits = search.top_n(centroids.matrix(), query, top_c);
    let max_score = hits.first()?.score;
    let labels: Vec<&str> = hits
        .iter()
        .filter_map(|hit| centroids.label(hit.index))
        .collect();

    debug!(
        centroids = centroids.len(),
        kept = labels.len(),
        max_score,
        search = search.name(),
        "Coarse shortlist"
    );

    Some(Shortlist { labels, max_score })
}
