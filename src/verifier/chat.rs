//! Multimodal chat backend over `genai`, pinned to one provider and endpoint.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ContentPart};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use tracing::{debug, info};

use super::error::{VerifierError, VerifierResult};
use super::{Verifier, VerifierPayload, candidate_prompt, resolve_reply};
use crate::retrieval::ScoreItem;

const MAX_TOKENS: u32 = 50;
const TEMPERATURE: f64 = 0.3;

/// Asks a vision chat model to pick one of the candidates.
pub struct ChatVerifier {
    name: &'static str,
    endpoint: String,
    model: String,
    timeout: Duration,
    client: Client,
}

impl ChatVerifier {
    /// Ollama through its OpenAI-compatible `/v1/` surface.
    pub fn ollama(base_url: &str, model: &str, timeout: Duration) -> Self {
        let endpoint = format!("{}/v1/", base_url.trim_end_matches('/').trim_end_matches("/v1"));
        Self::build("ollama", AdapterKind::Ollama, endpoint, model, None, timeout)
    }

    /// Any OpenAI-compatible `chat/completions` service.
    pub fn openai(base_url: &str, model: &str, api_key: String, timeout: Duration) -> Self {
        let endpoint = format!("{}/", base_url.trim_end_matches('/'));
        Self::build(
            "openai",
            AdapterKind::OpenAI,
            endpoint,
            model,
            Some(api_key),
            timeout,
        )
    }

    fn build(
        name: &'static str,
        adapter: AdapterKind,
        endpoint: String,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let target_endpoint = endpoint.clone();
        let resolver = ServiceTargetResolver::from_resolver_fn(
            move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                Ok(ServiceTarget {
                    endpoint: Endpoint::from_owned(target_endpoint.clone()),
                    auth: AuthData::from_single(api_key.clone().unwrap_or_default()),
                    model: ModelIden::new(adapter, target.model.model_name),
                })
            },
        );

        Self {
            name,
            endpoint,
            model: model.to_string(),
            timeout,
            client: Client::builder()
                .with_service_target_resolver(resolver)
                .build(),
        }
    }

    /// Base URL requests are resolved against. Always ends with `/`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(payload: &VerifierPayload, candidates: &[ScoreItem]) -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user(vec![
            ContentPart::from_text(candidate_prompt(candidates)),
            ContentPart::from_binary_base64(payload.mime_type.clone(), payload.base64(), None),
        ])])
    }
}

impl fmt::Debug for ChatVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatVerifier")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Verifier for ChatVerifier {
    fn name(&self) -> &str {
        self.name
    }

    async fn rerank(
        &self,
        payload: &VerifierPayload,
        candidates: &[ScoreItem],
    ) -> VerifierResult<Vec<ScoreItem>> {
        if payload.image.is_empty() {
            return Err(VerifierError::MissingPayload);
        }

        let options = ChatOptions::default()
            .with_max_tokens(MAX_TOKENS)
            .with_temperature(TEMPERATURE);
        let request = Self::request(payload, candidates);

        debug!(backend = self.name, endpoint = %self.endpoint, model = %self.model, candidates = candidates.len(), "Sending verification request");
        let response = tokio::time::timeout(
            self.timeout,
            self.client.exec_chat(self.model.as_str(), request, Some(&options)),
        )
        .await
        .map_err(|_| VerifierError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        })??;

        let reply = response
            .first_text()
            .ok_or_else(|| VerifierError::Malformed("response has no text content".into()))?;

        info!(backend = self.name, reply = %reply.trim(), "Verifier replied");
        resolve_reply(reply, candidates)
    }
}
