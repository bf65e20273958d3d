//! Lazily loaded, process-lifetime embedding store.
//!
//! [`EmbeddingStore`] owns the class bank and the centroid index. The first call to
//! [`EmbeddingStore::load_bank`] or [`EmbeddingStore::load_centroids`] reads and normalizes the
//! backing NPZ file; later calls hand out the same `Arc` until [`EmbeddingStore::clear_cache`].
//! Concurrent first loads are serialized behind a per-file load mutex, so a file is read once
//! no matter how many queries race for it.

pub mod bank;
pub mod error;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::constants::DEFAULT_MIN_SAMPLES;
use crate::storage::read_npz_file;

pub use bank::{CentroidIndex, ClassBank, ClassSamples, write_bank, write_centroids};
pub use error::{StoreError, StoreResult};

/// Locations of the persisted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub bank: PathBuf,
    pub centroids: PathBuf,
}

impl StorePaths {
    pub fn new(bank: impl Into<PathBuf>, centroids: impl Into<PathBuf>) -> Self {
        Self {
            bank: bank.into(),
            centroids: centroids.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Classes with fewer samples are left out of the bank.
    pub min_samples: usize,
    /// When false, a missing centroid file means full-scan mode instead of an error.
    pub require_centroids: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            require_centroids: false,
        }
    }
}

/// Summary of the loaded store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub classes: usize,
    pub total_samples: usize,
    pub dim: usize,
    pub centroids: usize,
    pub centroid_dim: usize,
    /// Bank classes without a centroid. They are only reachable in full-scan mode.
    pub bank_only: Vec<String>,
    /// Centroids without bank samples. Shortlisting them yields nothing.
    pub centroid_only: Vec<String>,
    pub generation: u64,
}

/// Memoized slot with its own load mutex.
struct Slot<T> {
    value: RwLock<Option<Arc<T>>>,
    load_lock: Mutex<()>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            value: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    fn get_or_load(&self, load: impl FnOnce() -> StoreResult<T>) -> StoreResult<Arc<T>> {
        if let Some(value) = self.value.read().as_ref() {
            return Ok(Arc::clone(value));
        }

        let _guard = self.load_lock.lock();
        if let Some(value) = self.value.read().as_ref() {
            return Ok(Arc::clone(value));
        }

        let value = Arc::new(load()?);
        *self.value.write() = Some(Arc::clone(&value));
        Ok(value)
    }

    fn clear(&self) {
        let _guard = self.load_lock.lock();
        *self.value.write() = None;
    }

    fn is_loaded(&self) -> bool {
        self.value.read().is_some()
    }
}

pub struct EmbeddingStore {
    paths: StorePaths,
    options: StoreOptions,
    bank: Slot<ClassBank>,
    centroids: Slot<CentroidIndex>,
    generation: AtomicU64,
}

impl std::fmt::Debug for EmbeddingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingStore")
            .field("paths", &self.paths)
            .field("options", &self.options)
            .field("bank_loaded", &self.bank.is_loaded())
            .field("centroids_loaded", &self.centroids.is_loaded())
            .field("generation", &self.generation())
            .finish()
    }
}

impl EmbeddingStore {
    pub fn new(paths: StorePaths, options: StoreOptions) -> Self {
        Self {
            paths,
            options,
            bank: Slot::new(),
            centroids: Slot::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Bumped by every [`clear_cache`](Self::clear_cache).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the class bank, loading it on first use.
    #[instrument(skip(self), fields(path = %self.paths.bank.display()))]
    pub fn load_bank(&self) -> StoreResult<Arc<ClassBank>> {
        self.bank.get_or_load(|| {
            let arrays = read_npz_file(&self.paths.bank)
                .map_err(|e| StoreError::from_read(self.paths.bank.clone(), e))?;
            let members = arrays.len();
            let bank = ClassBank::from_arrays(arrays, self.options.min_samples);

            info!(
                members,
                classes = bank.len(),
                samples = bank.total_samples(),
                dim = bank.dim(),
                "Loaded class bank"
            );
            if bank.is_empty() {
                warn!("Class bank is empty");
            }
            Ok(bank)
        })
    }

    /// Returns the centroid index, loading it on first use.
    ///
    /// A missing centroid file yields an empty index unless centroids are required.
    #[instrument(skip(self), fields(path = %self.paths.centroids.display()))]
    pub fn load_centroids(&self) -> StoreResult<Arc<CentroidIndex>> {
        self.centroids.get_or_load(|| {
            let arrays = match read_npz_file(&self.paths.centroids) {
                Ok(arrays) => arrays,
                Err(e) => match StoreError::from_read(self.paths.centroids.clone(), e) {
                    StoreError::DataNotFound { .. } if !self.options.require_centroids => {
                        warn!("Centroid file missing, queries fall back to full scan");
                        return Ok(CentroidIndex::default());
                    }
                    err => return Err(err),
                },
            };

            let members = arrays.len();
            let centroids = CentroidIndex::from_arrays(arrays);
            info!(
                members,
                centroids = centroids.len(),
                dim = centroids.dim(),
                "Loaded centroid index"
            );
            Ok(centroids)
        })
    }

    /// Drops both cached datasets; the next load reads the files again.
    pub fn clear_cache(&self) {
        self.centroids.clear();
        self.bank.clear();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(generation, "Cleared embedding store cache");
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let bank = self.load_bank()?;
        let centroids = self.load_centroids()?;

        let centroid_labels: HashSet<&str> =
            centroids.labels().iter().map(String::as_str).collect();
        let bank_only = bank
            .labels()
            .filter(|label| !centroid_labels.contains(label))
            .map(str::to_string)
            .collect();
        let centroid_only = centroids
            .labels()
            .iter()
            .filter(|label| !bank.contains(label.as_str()))
            .cloned()
            .collect();

        Ok(StoreStats {
            classes: bank.len(),
            total_samples: bank.total_samples(),
            dim: bank.dim(),
            centroids: centroids.len(),
            centroid_dim: centroids.dim(),
            bank_only,
            centroid_only,
            generation: self.generation(),
        })
    }

    /// Recomputes centroids from the bank and writes them to the centroid path.
    ///
    /// The cache is cleared afterwards so the next query sees the new file.
    #[instrument(skip(self), fields(path = %self.paths.centroids.display()))]
    pub fn rebuild_centroids(&self) -> StoreResult<usize> {
        let bank = self.load_bank()?;
        let centroids = bank.compute_centroids();
        persist(&self.paths.centroids, |path| write_centroids(path, &centroids))?;
        self.clear_cache();
        info!(centroids = centroids.len(), "Rebuilt centroid index");
        Ok(centroids.len())
    }
}

fn persist(
    path: &Path,
    write: impl FnOnce(&Path) -> crate::storage::StorageResult<()>,
) -> StoreResult<()> {
    write(path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
