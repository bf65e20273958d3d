use super::*;
use crate::hashing::QueryFingerprint;
use crate::retrieval::{EscalationStatus, QueryMeta, RankedResult, ScoreItem, SearchMode};

fn entry() -> (RankedResult, QueryMeta) {
    (
        RankedResult {
            items: vec![ScoreItem::new("denim", 0.9)],
            escalation_reason: None,
        },
        QueryMeta {
            ms: 1.5,
            coarse_max: 0.95,
            mode: SearchMode::Coarse,
            escalation: EscalationStatus::NotRequired,
            skipped_classes: 0,
            cached: false,
        },
    )
}

fn key(generation: u64) -> [u8; 32] {
    QueryCache::key(&QueryFingerprint {
        vector: &[1.0, 0.0],
        top_k: 5,
        top_c: 12,
        accelerate: true,
        lang: "zh",
        generation,
    })
}

#[test]
fn test_insert_and_get() {
    let cache = QueryCache::with_capacity(16);
    let (result, meta) = entry();
    cache.insert(key(0), result.clone(), meta.clone());

    let hit = cache.get(&key(0)).expect("entry should be cached");
    assert_eq!(hit.result, result);
    assert_eq!(hit.meta, meta);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_generation_is_part_of_key() {
    let cache = QueryCache::with_capacity(16);
    let (result, meta) = entry();
    cache.insert(key(0), result, meta);

    assert!(cache.get(&key(1)).is_none());
}

#[test]
fn test_invalidate_all() {
    let cache = QueryCache::with_capacity(16);
    let (result, meta) = entry();
    cache.insert(key(0), result, meta);

    cache.invalidate_all();
    assert!(cache.get(&key(0)).is_none());
    assert!(cache.is_empty());
}
