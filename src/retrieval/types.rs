use std::fmt;

use serde::Serialize;

use crate::config::ConfigError;
use crate::constants::{DEFAULT_LANG, DEFAULT_TOP_C, DEFAULT_TOP_K};
use crate::verifier::VerifierPayload;

/// One ranked label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreItem {
    pub label: String,
    /// Clipped cosine in `[-1, 1]`.
    pub score: f32,
    pub display_label: String,
}

impl ScoreItem {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        let label = label.into();
        Self {
            display_label: label.clone(),
            label,
            score,
        }
    }

    /// Score clamped into `[0, 1]` for presentation.
    pub fn confidence(&self) -> f32 {
        self.score.clamp(0.0, 1.0)
    }
}

/// Why the gate handed the ranking to the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum EscalationReason {
    LowConfidence,
    AmbiguousTop2,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowConfidence => write!(f, "low confidence"),
            Self::AmbiguousTop2 => write!(f, "ambiguous top-2"),
        }
    }
}

impl From<EscalationReason> for String {
    fn from(reason: EscalationReason) -> Self {
        reason.to_string()
    }
}

/// Ordered labels, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub items: Vec<ScoreItem>,
    pub escalation_reason: Option<EscalationReason>,
}

impl RankedResult {
    pub fn top(&self) -> Option<&ScoreItem> {
        self.items.first()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.label.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Centroid shortlist, then fine ranking of the shortlisted classes.
    Coarse,
    /// No usable centroids; every bank class was ranked.
    FullScan,
}

/// Outcome of the escalation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EscalationStatus {
    NotRequired,
    /// The gate fired but no verifier is configured.
    Unavailable,
    /// The verifier agreed with rank 1.
    Kept,
    /// The verifier's choice was swapped to the front from `from_rank` (1-based).
    Promoted { label: String, from_rank: usize },
    /// The verifier chose a label outside the candidates; ignored.
    Rejected { label: String },
    Failed { error: String },
}

impl EscalationStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMeta {
    /// Wall-clock milliseconds spent on the query.
    pub ms: f64,
    /// Best centroid score, or the best fine score in full-scan mode.
    pub coarse_max: f32,
    pub mode: SearchMode,
    pub escalation: EscalationStatus,
    /// Shortlisted classes without bank samples.
    pub skipped_classes: usize,
    pub cached: bool,
}

/// A retrieval request.
///
/// Unset limits fall back to the engine settings.
#[derive(Debug, Clone, Default)]
pub struct RetrievalQuery {
    pub vector: Vec<f32>,
    pub top_k: Option<usize>,
    pub top_c: Option<usize>,
    pub accelerate: Option<bool>,
    pub image: Option<VerifierPayload>,
    pub lang: Option<String>,
}

impl RetrievalQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            ..Default::default()
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn top_c(mut self, top_c: usize) -> Self {
        self.top_c = Some(top_c);
        self
    }

    pub fn accelerate(mut self, accelerate: bool) -> Self {
        self.accelerate = Some(accelerate);
        self
    }

    pub fn with_image(mut self, image: VerifierPayload) -> Self {
        self.image = Some(image);
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }
}

/// Engine-wide defaults and gate thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub top_c: usize,
    pub low_confidence: f32,
    pub close_gap: f32,
    pub accelerate: bool,
    pub lang: String,
    pub verifier_timeout: std::time::Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            top_c: DEFAULT_TOP_C,
            low_confidence: crate::constants::DEFAULT_LOW_CONFIDENCE,
            close_gap: crate::constants::DEFAULT_CLOSE_GAP,
            accelerate: true,
            lang: DEFAULT_LANG.to_string(),
            verifier_timeout: std::time::Duration::from_millis(
                crate::constants::DEFAULT_VERIFIER_TIMEOUT_MS,
            ),
        }
    }
}

impl RetrievalSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            top_k: config.top_k,
            top_c: config.top_c,
            low_confidence: config.low_confidence,
            close_gap: config.close_gap,
            accelerate: config.accelerate,
            lang: config.lang.clone(),
            ..Default::default()
        }
    }

    pub fn with_verifier_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.verifier_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::ZeroCount { name: "top_k" });
        }
        if self.top_c == 0 {
            return Err(ConfigError::ZeroCount { name: "top_c" });
        }
        if !self.low_confidence.is_finite() {
            return Err(ConfigError::InvalidThreshold {
                name: "low_confidence",
                value: self.low_confidence,
                reason: "must be finite",
            });
        }
        if !self.close_gap.is_finite() || self.close_gap < 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "close_gap",
                value: self.close_gap,
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}
