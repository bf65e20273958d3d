//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A threshold is NaN, infinite or outside its range.
    #[error("invalid threshold {name} = {value}: {reason}")]
    InvalidThreshold {
        name: &'static str,
        value: f32,
        reason: &'static str,
    },

    /// A count that must be positive was zero.
    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },

    /// More final results requested than the coarse stage shortlists.
    #[error("top_k ({top_k}) must not exceed top_c ({top_c})")]
    TopKExceedsTopC { top_k: usize, top_c: usize },

    /// Unknown verifier backend name.
    #[error("unknown verifier backend '{value}' (expected none, ollama or openai)")]
    UnknownBackend { value: String },

    /// A required environment variable was not set.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar { name: &'static str },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {}", path.display())]
    NotAFile { path: PathBuf },
}
