//! Cross-cutting, shared constants.
//!
//! Retrieval defaults live here so that the config layer, the engine, and the CLI agree on them.
//!
//! # Dimension Invariants
//!
//! The store decides its embedding width at load time (every accepted class shares one width).
//! Queries are checked against that width with [`validate_embedding_dim`] before any scoring.
//! [`DEFAULT_EMBEDDING_DIM`] is only the width the reference encoder produces.

/// Width produced by the dual-channel CLIP encoder (512 + 1024).
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Minimum number of samples a class needs to be kept in the bank.
pub const DEFAULT_MIN_SAMPLES: usize = 3;

/// Number of classes the coarse stage hands to the fine stage.
pub const DEFAULT_TOP_C: usize = 12;

/// Number of ranked labels returned to the caller.
pub const DEFAULT_TOP_K: usize = 5;

/// Top-1 cosine score below which the ranking is escalated.
pub const DEFAULT_LOW_CONFIDENCE: f32 = 0.30;

/// Top-1/top-2 gap below which the ranking is escalated.
pub const DEFAULT_CLOSE_GAP: f32 = 0.03;

/// Upper bound on a single verifier call.
pub const DEFAULT_VERIFIER_TIMEOUT_MS: u64 = 30_000;

/// Query-cache entries kept in memory (0 disables the cache).
pub const DEFAULT_QUERY_CACHE_CAPACITY: u64 = 1024;

/// Display language used when the caller does not pick one.
pub const DEFAULT_LANG: &str = "zh";

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimValidationError {
    /// Embedding dimension cannot be zero.
    ZeroDimension,
    /// Runtime dimension does not match expected dimension.
    DimensionMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for DimValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroDimension => write!(f, "embedding dimension cannot be zero"),
            Self::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "dimension mismatch: expected {}, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for DimValidationError {}

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// Use this at module boundaries to catch dimension mismatches early, rather than
/// scoring a truncated dot product deep in the pipeline.
///
/// # Example
///
/// ```
/// use swatch::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// let encoder_dim = 1536;
/// validate_embedding_dim(encoder_dim, DEFAULT_EMBEDDING_DIM).unwrap();
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual == 0 {
        return Err(DimValidationError::ZeroDimension);
    }
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
