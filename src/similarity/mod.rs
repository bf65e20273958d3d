//! Exact vector similarity.
//!
//! Every stored and query vector is L2-normalized before scoring, so cosine similarity reduces
//! to a dot product. [`dot`] is the single kernel used everywhere; the two
//! [`SimilaritySearch`] implementations only differ in how they select the best rows, which
//! keeps their scores bit-identical.

pub mod matrix;
pub mod search;

pub use matrix::{Matrix, MatrixShapeError};
pub use search::{BruteForce, Hit, IndexAccelerated, SimilaritySearch, search_for};

const LANES: usize = 8;

/// Dot product with a fixed 8-lane accumulation order.
///
/// Slices of different length are scored over their common prefix; callers validate widths
/// before scoring.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut acc = [0.0f32; LANES];
    let chunks_a = a.chunks_exact(LANES);
    let chunks_b = b.chunks_exact(LANES);
    let tail_a = chunks_a.remainder();
    let tail_b = chunks_b.remainder();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        for lane in 0..LANES {
            acc[lane] += ca[lane] * cb[lane];
        }
    }

    let mut sum = (acc[0] + acc[4]) + (acc[1] + acc[5]) + (acc[2] + acc[6]) + (acc[3] + acc[7]);
    for (x, y) in tail_a.iter().zip(tail_b) {
        sum += x * y;
    }
    sum
}

/// Cosine of two unit vectors, clipped into `[-1, 1]` to absorb rounding drift.
#[inline]
pub fn clipped_cosine(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b).clamp(-1.0, 1.0)
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
#[inline]
pub fn l2_normalize(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Returns a unit-length copy of `v`.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    l2_normalize(&mut out);
    out
}

/// True when every component is finite.
#[inline]
pub fn all_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests;
