//! Escalation gate and the single-swap merge.

use super::types::{EscalationReason, EscalationStatus, ScoreItem};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatePolicy {
    /// Escalate when top-1 is below this cosine.
    pub low_confidence: f32,
    /// Escalate when top-1 minus top-2 is below this.
    pub close_gap: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accept,
    Escalate(EscalationReason),
}

impl GatePolicy {
    pub fn new(low_confidence: f32, close_gap: f32) -> Self {
        Self {
            low_confidence,
            close_gap,
        }
    }

    /// First matching rule wins: low top-1, then a narrow top-2 gap.
    pub fn evaluate(&self, ranked: &[ScoreItem]) -> GateDecision {
        let Some(top1) = ranked.first() else {
            return GateDecision::Accept;
        };

        if top1.score < self.low_confidence {
            return GateDecision::Escalate(EscalationReason::LowConfidence);
        }

        if let Some(top2) = ranked.get(1)
            && top1.score - top2.score < self.close_gap
        {
            return GateDecision::Escalate(EscalationReason::AmbiguousTop2);
        }

        GateDecision::Accept
    }
}

/// Position of `chosen` among `ranked`; exact match first, then ignoring case.
pub fn find_candidate(ranked: &[ScoreItem], chosen: &str) -> Option<usize> {
    ranked
        .iter()
        .position(|item| item.label == chosen)
        .or_else(|| {
            let chosen = chosen.to_lowercase();
            ranked
                .iter()
                .position(|item| item.label.to_lowercase() == chosen)
        })
}

/// Swaps `chosen` with rank 1. Returns `ranked` unchanged when `chosen` is absent.
pub fn swap_to_front(mut ranked: Vec<ScoreItem>, chosen: &str) -> Vec<ScoreItem> {
    if let Some(pos) = find_candidate(&ranked, chosen) {
        ranked.swap(0, pos);
    }
    ranked
}

/// Applies a verifier reply to `ranked`.
///
/// Only the first label of `reply` counts. An empty reply is malformed.
pub fn merge_verdict(
    ranked: Vec<ScoreItem>,
    reply: &[ScoreItem],
) -> (Vec<ScoreItem>, EscalationStatus) {
    let Some(chosen) = reply.first() else {
        return (
            ranked,
            EscalationStatus::Failed {
                error: "verifier returned no candidates".to_string(),
            },
        );
    };

    match find_candidate(&ranked, &chosen.label) {
        None => (
            ranked,
            EscalationStatus::Rejected {
                label: chosen.label.clone(),
            },
        ),
        Some(0) => (ranked, EscalationStatus::Kept),
        Some(pos) => {
            let label = ranked[pos].label.clone();
            let merged = swap_to_front(ranked, &label);
            (
                merged,
                EscalationStatus::Promoted {
                    label,
                    from_rank: pos + 1,
                },
            )
        }
    }
}
