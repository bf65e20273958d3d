//! BLAKE3 fingerprints of retrieval requests.

use blake3::Hasher;

/// Everything that determines a retrieval result for a frozen store.
#[derive(Debug, Clone, Copy)]
pub struct QueryFingerprint<'a> {
    /// The normalized query vector.
    pub vector: &'a [f32],
    pub top_k: usize,
    pub top_c: usize,
    pub accelerate: bool,
    pub lang: &'a str,
    /// Store generation; bumped on every cache clear.
    pub generation: u64,
}

/// Full 32-byte digest of a request, used as the query-cache key.
///
/// Vector components are hashed by bit pattern, so `0.0` and `-0.0` give different keys.
/// That only costs a cache miss.
pub fn hash_query(fp: &QueryFingerprint<'_>) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(&(fp.vector.len() as u64).to_le_bytes());
    for x in fp.vector {
        hasher.update(&x.to_bits().to_le_bytes());
    }
    hasher.update(&(fp.top_k as u64).to_le_bytes());
    hasher.update(&(fp.top_c as u64).to_le_bytes());
    hasher.update(&[u8::from(fp.accelerate)]);
    hasher.update(&(fp.lang.len() as u64).to_le_bytes());
    hasher.update(fp.lang.as_bytes());
    hasher.update(&fp.generation.to_le_bytes());
    *hasher.finalize().as_bytes()
}

/// First 8 bytes of a digest, for compact log fields.
#[inline]
pub fn digest_prefix(digest: &[u8; 32]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
