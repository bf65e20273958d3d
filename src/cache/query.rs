//! In-memory query-result cache.
//!
//! Keys are [`hash_query`] digests, which include the store generation, so clearing the store
//! makes every older entry unreachable even before it is evicted.

use std::sync::Arc;

use moka::sync::Cache;

use crate::hashing::{QueryFingerprint, hash_query};
use crate::retrieval::{QueryMeta, RankedResult};

#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    pub result: RankedResult,
    pub meta: QueryMeta,
}

/// Bounded cache of finished rankings keyed by request digest.
pub struct QueryCache {
    entries: Cache<[u8; 32], Arc<CachedQuery>>,
}

impl QueryCache {
    /// Creates a cache with a max entry capacity.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    #[inline]
    pub fn key(fp: &QueryFingerprint<'_>) -> [u8; 32] {
        hash_query(fp)
    }

    #[inline]
    pub fn get(&self, key: &[u8; 32]) -> Option<Arc<CachedQuery>> {
        self.entries.get(key)
    }

    #[inline]
    pub fn insert(&self, key: [u8; 32], result: RankedResult, meta: QueryMeta) {
        self.entries
            .insert(key, Arc::new(CachedQuery { result, meta }));
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Approximate entry count (moka applies writes lazily).
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
