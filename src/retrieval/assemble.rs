use std::time::Instant;

use super::types::{
    EscalationReason, EscalationStatus, QueryMeta, RankedResult, ScoreItem, SearchMode,
};
use crate::labels::LabelProjector;

/// Pipeline output before truncation and labelling.
#[derive(Debug, Clone)]
pub struct Draft {
    pub items: Vec<ScoreItem>,
    pub escalation_reason: Option<EscalationReason>,
    pub escalation: EscalationStatus,
    pub mode: SearchMode,
    pub coarse_max: f32,
    pub skipped_classes: usize,
}

/// Fills display labels and packages the final result.
pub struct ResultAssembler<'a> {
    labels: &'a dyn LabelProjector,
    lang: &'a str,
}

impl<'a> ResultAssembler<'a> {
    pub fn new(labels: &'a dyn LabelProjector, lang: &'a str) -> Self {
        Self { labels, lang }
    }

    pub fn assemble(&self, draft: Draft, top_k: usize, started: Instant) -> (RankedResult, QueryMeta) {
        let mut items = draft.items;
        items.truncate(top_k);
        for item in &mut items {
            item.display_label = self.labels.display(&item.label, self.lang);
        }

        let meta = QueryMeta {
            ms: elapsed_ms(started),
            coarse_max: draft.coarse_max,
            mode: draft.mode,
            escalation: draft.escalation,
            skipped_classes: draft.skipped_classes,
            cached: false,
        };

        (
            RankedResult {
                items,
                escalation_reason: draft.escalation_reason,
            },
            meta,
        )
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
