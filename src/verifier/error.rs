use thiserror::Error;

/// Verifier failures. The engine absorbs all of them and keeps its own ranking.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("verifier timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("verifier request failed: {0}")]
    Provider(#[from] genai::Error),

    #[error("malformed verifier response: {0}")]
    Malformed(String),

    #[error("no image payload to verify against")]
    MissingPayload,
}

pub type VerifierResult<T> = Result<T, VerifierError>;
