use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use super::assemble::{Draft, ResultAssembler, elapsed_ms};
use super::coarse;
use super::error::{RetrievalError, RetrievalResult};
use super::fine;
use super::gate::{GateDecision, GatePolicy, merge_verdict};
use super::types::{
    EscalationReason, EscalationStatus, QueryMeta, RankedResult, RetrievalQuery,
    RetrievalSettings, ScoreItem, SearchMode,
};
use crate::cache::QueryCache;
use crate::config::Config;
use crate::constants::validate_embedding_dim;
use crate::hashing::{QueryFingerprint, digest_prefix};
use crate::labels::{IdentityProjector, LabelCatalog, LabelProjector};
use crate::similarity::{all_finite, normalized, search_for};
use crate::store::EmbeddingStore;
use crate::verifier::{VerifierCapability, VerifierConfig, VerifierError, VerifierPayload};

/// Confidence-gated two-stage retrieval over an [`EmbeddingStore`].
///
/// Cheap to share behind an `Arc`; every query is independent.
pub struct RetrievalEngine {
    store: Arc<EmbeddingStore>,
    settings: RetrievalSettings,
    gate: GatePolicy,
    verifier: VerifierCapability,
    labels: Arc<dyn LabelProjector>,
    cache: Option<QueryCache>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .field("verifier", &self.verifier)
            .field("cache", &self.cache)
            .finish()
    }
}

impl RetrievalEngine {
    /// Engine without verifier, label catalog or query cache.
    pub fn new(store: Arc<EmbeddingStore>, settings: RetrievalSettings) -> RetrievalResult<Self> {
        settings.validate()?;
        Ok(Self {
            gate: GatePolicy::new(settings.low_confidence, settings.close_gap),
            store,
            settings,
            verifier: VerifierCapability::unavailable("no verifier configured"),
            labels: Arc::new(IdentityProjector),
            cache: None,
        })
    }

    /// Wires store, labels, cache and verifier from configuration.
    pub fn from_config(config: &Config, verifier_config: &VerifierConfig) -> RetrievalResult<Self> {
        config.validate()?;
        let verifier = VerifierCapability::from_config(verifier_config)?;

        let store = Arc::new(EmbeddingStore::new(
            config.store_paths(),
            config.store_options(),
        ));
        let labels = LabelCatalog::load(&config.labels_path, &config.aliases_path);
        let settings =
            RetrievalSettings::from_config(config).with_verifier_timeout(verifier_config.timeout);

        Ok(Self::new(store, settings)?
            .with_verifier(verifier)
            .with_labels(Arc::new(labels))
            .with_query_cache(config.query_cache_capacity))
    }

    pub fn with_verifier(mut self, verifier: VerifierCapability) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_labels(mut self, labels: Arc<dyn LabelProjector>) -> Self {
        self.labels = labels;
        self
    }

    /// Enables the query-result cache; `0` disables it.
    pub fn with_query_cache(mut self, capacity: u64) -> Self {
        self.cache = (capacity > 0).then(|| QueryCache::with_capacity(capacity));
        self
    }

    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn verifier(&self) -> &VerifierCapability {
        &self.verifier
    }

    pub fn query_cache(&self) -> Option<&QueryCache> {
        self.cache.as_ref()
    }

    /// Drops the loaded store and every cached result.
    pub fn clear_cache(&self) {
        self.store.clear_cache();
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    pub async fn retrieve_vector(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        top_c: usize,
        accelerate: bool,
    ) -> RetrievalResult<(RankedResult, QueryMeta)> {
        self.retrieve(
            RetrievalQuery::new(vector)
                .top_k(top_k)
                .top_c(top_c)
                .accelerate(accelerate),
        )
        .await
    }

    #[instrument(skip(self, query), fields(dim = query.vector.len()))]
    pub async fn retrieve(&self, query: RetrievalQuery) -> RetrievalResult<(RankedResult, QueryMeta)> {
        let started = Instant::now();

        let top_k = query.top_k.unwrap_or(self.settings.top_k);
        let top_c = query.top_c.unwrap_or(self.settings.top_c);
        let accelerate = query.accelerate.unwrap_or(self.settings.accelerate);
        let lang = query.lang.as_deref().unwrap_or(&self.settings.lang);

        if top_k == 0 || top_c == 0 {
            return Err(RetrievalError::InvalidQuery(
                "top_k and top_c must be at least 1".to_string(),
            ));
        }
        if query.vector.is_empty() {
            return Err(RetrievalError::InvalidQuery("empty query vector".to_string()));
        }
        if !all_finite(&query.vector) {
            return Err(RetrievalError::InvalidQuery(
                "query vector contains non-finite values".to_string(),
            ));
        }

        let generation = self.store.generation();
        let bank = self.store.load_bank()?;
        if bank.is_empty() {
            return Err(RetrievalError::NoCandidates);
        }
        validate_embedding_dim(query.vector.len(), bank.dim()).map_err(|_| {
            RetrievalError::DimensionMismatch {
                expected: bank.dim(),
                actual: query.vector.len(),
            }
        })?;
        let centroids = self.store.load_centroids()?;

        let q = normalized(&query.vector);

        let cache_key = self.cache.as_ref().map(|_| {
            QueryCache::key(&QueryFingerprint {
                vector: &q,
                top_k,
                top_c,
                accelerate,
                lang,
                generation,
            })
        });
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Some(hit) = cache.get(key)
        {
            debug!(key = digest_prefix(key), "Query cache hit");
            let mut meta = hit.meta.clone();
            meta.cached = true;
            meta.ms = elapsed_ms(started);
            return Ok((hit.result.clone(), meta));
        }

        let search = search_for(accelerate);

        let (ranking, mode, coarse_max) = {
            let usable = !centroids.is_empty() && centroids.dim() == bank.dim();
            if !centroids.is_empty() && !usable {
                warn!(
                    centroid_dim = centroids.dim(),
                    bank_dim = bank.dim(),
                    "Centroid width differs from bank width, ignoring centroids"
                );
            }

            let shortlist = if usable {
                coarse::shortlist(&centroids, &q, top_c, search)
            } else {
                None
            };

            match shortlist {
                Some(shortlist) => {
                    let ranking = fine::rank(&bank, shortlist.labels, &q, search);
                    if ranking.items.is_empty() && !bank.is_empty() {
                        warn!(
                            skipped = ranking.skipped,
                            classes = bank.len(),
                            "No shortlisted class is in the bank, falling back to full scan"
                        );
                        let mut full = fine::rank(&bank, bank.labels(), &q, search);
                        full.skipped += ranking.skipped;
                        (full, SearchMode::FullScan, None)
                    } else {
                        (ranking, SearchMode::Coarse, Some(shortlist.max_score))
                    }
                }
                None => {
                    debug!(classes = bank.len(), "No centroids, full scan");
                    let ranking = fine::rank(&bank, bank.labels(), &q, search);
                    (ranking, SearchMode::FullScan, None)
                }
            }
        };

        let Some(best) = ranking.items.first() else {
            return Err(RetrievalError::NoCandidates);
        };
        let coarse_max = coarse_max.unwrap_or(best.score);
        let skipped_classes = ranking.skipped;

        let mut items = ranking.items;
        items.truncate(top_k);

        let (items, escalation_reason, escalation) = match self.gate.evaluate(&items) {
            GateDecision::Accept => (items, None, EscalationStatus::NotRequired),
            GateDecision::Escalate(reason) => {
                let (items, status) = self.escalate(reason, items, query.image.as_ref()).await;
                (items, Some(reason), status)
            }
        };

        let draft = Draft {
            items,
            escalation_reason,
            escalation,
            mode,
            coarse_max,
            skipped_classes,
        };
        let (result, meta) =
            ResultAssembler::new(self.labels.as_ref(), lang).assemble(draft, top_k, started);

        if let (Some(cache), Some(key)) = (&self.cache, cache_key)
            && !meta.escalation.is_failed()
        {
            cache.insert(key, result.clone(), meta.clone());
        }

        debug!(
            top = result.top().map(|i| i.label.as_str()),
            ms = meta.ms,
            mode = ?meta.mode,
            "Query complete"
        );
        Ok((result, meta))
    }

    async fn escalate(
        &self,
        reason: EscalationReason,
        items: Vec<ScoreItem>,
        payload: Option<&VerifierPayload>,
    ) -> (Vec<ScoreItem>, EscalationStatus) {
        let top1 = items.first().map(|i| i.score);

        let verifier = match &self.verifier {
            VerifierCapability::Available(verifier) => Arc::clone(verifier),
            VerifierCapability::Unavailable { reason: why } => {
                info!(%reason, ?top1, unavailable = %why, "Escalation requested but no verifier");
                return (items, EscalationStatus::Unavailable);
            }
        };

        let Some(payload) = payload else {
            warn!(%reason, "Escalation requested but the query carries no image");
            return (
                items,
                EscalationStatus::Failed {
                    error: VerifierError::MissingPayload.to_string(),
                },
            );
        };

        info!(%reason, ?top1, verifier = verifier.name(), candidates = items.len(), "Escalating to verifier");

        let timeout = self.settings.verifier_timeout;
        let outcome = match tokio::time::timeout(timeout, verifier.rerank(payload, &items)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(VerifierError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(reply) => {
                let (merged, status) = merge_verdict(items, &reply);
                match &status {
                    EscalationStatus::Promoted { label, from_rank } => {
                        info!(%label, from_rank, "Verifier promoted candidate")
                    }
                    EscalationStatus::Rejected { label } => {
                        warn!(%label, "Verifier chose a label outside the candidates, ignoring")
                    }
                    EscalationStatus::Failed { error } => {
                        warn!(%error, "Verifier reply unusable, keeping ranking")
                    }
                    _ => debug!("Verifier kept rank 1"),
                }
                (merged, status)
            }
            Err(e) => {
                warn!(error = %e, verifier = verifier.name(), "Verifier failed, keeping ranking");
                (
                    items,
                    EscalationStatus::Failed {
                        error: e.to_string(),
                    },
                )
            }
        }
    }
}
