//! Optional external verification of ambiguous rankings.
//!
//! A [`Verifier`] looks at the query image and the current candidates and names the label
//! it believes is correct. The engine only honours the first label of the returned list, and
//! only through a single swap with rank 1. Every backend failure is absorbed by the engine.

pub mod chat;
pub mod config;
pub mod error;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ConfigError;
use crate::retrieval::{ScoreItem, swap_to_front};

pub use chat::ChatVerifier;
pub use config::{VerifierBackend, VerifierConfig};
pub use error::{VerifierError, VerifierResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockVerifier;

/// Encoded image sent to the verifier.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifierPayload {
    pub image: Vec<u8>,
    pub mime_type: String,
}

impl VerifierPayload {
    pub fn new(image: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            image,
            mime_type: mime_type.into(),
        }
    }

    pub fn png(image: Vec<u8>) -> Self {
        Self::new(image, "image/png")
    }

    pub fn jpeg(image: Vec<u8>) -> Self {
        Self::new(image, "image/jpeg")
    }

    pub(crate) fn base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&self.image)
    }
}

impl fmt::Debug for VerifierPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierPayload")
            .field("bytes", &self.image.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Reranks candidates against the query image.
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the candidates with the preferred label first.
    async fn rerank(
        &self,
        payload: &VerifierPayload,
        candidates: &[ScoreItem],
    ) -> VerifierResult<Vec<ScoreItem>>;
}

/// Whether escalation can reach a verifier.
#[derive(Clone)]
pub enum VerifierCapability {
    Available(Arc<dyn Verifier>),
    Unavailable { reason: String },
}

impl VerifierCapability {
    pub fn available(verifier: impl Verifier + 'static) -> Self {
        Self::Available(Arc::new(verifier))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Builds the configured backend.
    pub fn from_config(config: &VerifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capability = match config.backend {
            VerifierBackend::None => Self::unavailable("no verifier backend configured"),
            VerifierBackend::Ollama => Self::available(ChatVerifier::ollama(
                &config.ollama_url,
                &config.ollama_model,
                config.timeout,
            )),
            VerifierBackend::OpenAi => {
                let api_key =
                    config
                        .openai_api_key
                        .clone()
                        .ok_or(ConfigError::MissingEnvVar {
                            name: VerifierConfig::ENV_OPENAI_API_KEY,
                        })?;
                Self::available(ChatVerifier::openai(
                    &config.openai_base_url,
                    &config.openai_model,
                    api_key,
                    config.timeout,
                ))
            }
        };
        info!(backend = %config.backend, available = capability.is_available(), "Verifier configured");
        Ok(capability)
    }
}

impl fmt::Debug for VerifierCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(v) => f.debug_tuple("Available").field(&v.name()).finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Prompt listing the candidates by rank.
pub(crate) fn candidate_prompt(candidates: &[ScoreItem]) -> String {
    let mut prompt = String::from(
        "You are a textile expert. Look at the fabric in this image and pick the most likely \
         fabric type from these candidates:\n\n",
    );
    for (rank, item) in candidates.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {} (score: {:.2})", rank + 1, item.label, item.score);
    }
    prompt.push_str(
        "\nReply with the fabric label only, exactly as written above, with no explanation. \
         If the first candidate is right, reply with it.",
    );
    prompt
}

/// Maps a free-text reply onto the candidates.
///
/// A reply matching a candidate (ignoring case and surrounding quotes) yields the candidates
/// with that label first. Any other reply yields a single item carrying the reply text.
pub(crate) fn resolve_reply(
    reply: &str,
    candidates: &[ScoreItem],
) -> VerifierResult<Vec<ScoreItem>> {
    let choice = reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim();
    if choice.is_empty() {
        return Err(VerifierError::Malformed("empty reply".to_string()));
    }

    let matched = candidates
        .iter()
        .find(|item| item.label.to_lowercase() == choice.to_lowercase());

    Ok(match matched {
        Some(item) => swap_to_front(candidates.to_vec(), &item.label),
        None => vec![ScoreItem::new(choice, 0.0)],
    })
}
