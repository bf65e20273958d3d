use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{VerifierError, VerifierResult};
use super::{Verifier, VerifierPayload, resolve_reply};
use crate::retrieval::ScoreItem;

#[derive(Debug, Clone)]
enum Script {
    /// Reply with this text, as a model would.
    Reply(String),
    /// Return this list verbatim.
    Return(Vec<ScoreItem>),
    Fail(String),
}

/// Scripted verifier for tests.
#[derive(Debug)]
pub struct MockVerifier {
    script: Script,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl MockVerifier {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `label`, matched against the candidates like a real backend.
    pub fn choosing(label: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(label.into()))
    }

    pub fn returning(items: Vec<ScoreItem>) -> Self {
        Self::with_script(Script::Return(items))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(message.into()))
    }

    /// Sleeps before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Candidate labels of every call, in call order.
    pub fn seen_candidates(&self) -> Vec<Vec<String>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn rerank(
        &self,
        _payload: &VerifierPayload,
        candidates: &[ScoreItem],
    ) -> VerifierResult<Vec<ScoreItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .push(candidates.iter().map(|c| c.label.clone()).collect());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            Script::Reply(text) => resolve_reply(text, candidates),
            Script::Return(items) => Ok(items.clone()),
            Script::Fail(message) => Err(VerifierError::Malformed(message.clone())),
        }
    }
}
