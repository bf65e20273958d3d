//! Swatch retrieval library crate (used by the CLI, benches and integration tests).
//!
//! Classifies a query embedding against a bank of per-class reference embeddings in two
//! stages: a centroid shortlist, then exhaustive scoring of the shortlisted classes' samples.
//! A confidence gate hands low-confidence or ambiguous rankings to an optional verifier.
//!
//! # Public API Surface
//!
//! ## Retrieval
//! - [`RetrievalEngine`] - The query pipeline
//! - [`RetrievalQuery`], [`RetrievalSettings`] - Per-query and engine-wide knobs
//! - [`RankedResult`], [`QueryMeta`], [`ScoreItem`] - Output
//!
//! ## Store
//! - [`EmbeddingStore`] - Lazily loaded, memoized bank and centroid index
//! - [`ClassBank`], [`CentroidIndex`] - In-memory store contents
//!
//! ## Similarity
//! - [`SimilaritySearch`] with [`BruteForce`] and [`IndexAccelerated`] implementations
//!
//! ## Verification
//! - [`Verifier`], [`VerifierCapability`] - Optional external re-ranking
//! - [`ChatVerifier`] - Ollama and OpenAI-compatible vision chat backends
//!
//! ## Test/Mock Support
//! [`MockVerifier`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod hashing;
pub mod labels;
pub mod retrieval;
pub mod similarity;
pub mod storage;
pub mod store;
pub mod verifier;

pub use cache::{CachedQuery, QueryCache};
pub use config::{Config, ConfigError};
pub use constants::{DimValidationError, validate_embedding_dim};
pub use hashing::{QueryFingerprint, hash_query};
pub use labels::{IdentityProjector, LabelCatalog, LabelProjector};
pub use retrieval::{
    EscalationReason, EscalationStatus, QueryMeta, RankedResult, RetrievalEngine, RetrievalError,
    RetrievalQuery, RetrievalResult, RetrievalSettings, ScoreItem, SearchMode,
};
pub use similarity::{BruteForce, Hit, IndexAccelerated, Matrix, SimilaritySearch, search_for};
pub use storage::{NpyArray, StorageError};
pub use store::{
    CentroidIndex, ClassBank, EmbeddingStore, StoreError, StoreOptions, StorePaths, StoreStats,
};
#[cfg(any(test, feature = "mock"))]
pub use verifier::MockVerifier;
pub use verifier::{
    ChatVerifier, Verifier, VerifierBackend, VerifierCapability, VerifierConfig, VerifierError,
    VerifierPayload,
};
