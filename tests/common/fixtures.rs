//! Test fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use swatch::retrieval::{RetrievalEngine, RetrievalSettings};
use swatch::storage::write_npz_file;
use swatch::store::{ClassBank, EmbeddingStore, StoreOptions, StorePaths, write_centroids};
use swatch::verifier::VerifierPayload;
use tempfile::TempDir;

pub const BANK_FILE: &str = "fabric_bank.npz";

pub const CENTROIDS_FILE: &str = "fabric_centroids.npz";

/// Options that keep single-sample classes.
pub const FIXTURE_OPTIONS: StoreOptions = StoreOptions {
    min_samples: 1,
    require_centroids: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Centroids {
    /// No centroid file on disk.
    Missing,
    /// A zero-byte centroid file.
    Empty,
    /// Centroids computed from the bank.
    Computed,
}

/// Builds a bank (and optionally centroids) in a temporary directory.
#[derive(Debug, Clone)]
pub struct StoreFixtureBuilder {
    classes: Vec<(String, Vec<Vec<f32>>)>,
    centroids: Centroids,
}

impl Default for StoreFixtureBuilder {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            centroids: Centroids::Computed,
        }
    }
}

impl StoreFixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, label: &str, samples: Vec<Vec<f32>>) -> Self {
        self.classes.push((label.to_string(), samples));
        self
    }

    pub fn centroids(mut self, centroids: Centroids) -> Self {
        self.centroids = centroids;
        self
    }

    /// `classes` seeded classes of `samples` rows each.
    pub fn seeded(mut self, classes: usize, samples: usize, dim: usize) -> Self {
        for c in 0..classes {
            let rows = (0..samples)
                .map(|s| seeded_vector((c * 1000 + s) as u64, dim))
                .collect();
            self.classes.push((format!("fabric_{c:03}"), rows));
        }
        self
    }

    pub fn build(self) -> StoreFixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(dir.path().join(BANK_FILE), dir.path().join(CENTROIDS_FILE));

        write_classes(&paths.bank, &self.classes);

        match self.centroids {
            Centroids::Missing => {}
            Centroids::Empty => {
                std::fs::File::create(&paths.centroids).expect("create empty centroids");
            }
            Centroids::Computed => {
                let arrays = swatch::storage::read_npz_file(&paths.bank).expect("read bank");
                let bank = ClassBank::from_arrays(arrays, FIXTURE_OPTIONS.min_samples);
                write_centroids(&paths.centroids, &bank.compute_centroids())
                    .expect("write centroids");
            }
        }

        StoreFixture {
            _dir: dir,
            paths,
            classes: self.classes,
        }
    }
}

/// A persisted store that lives as long as the fixture.
pub struct StoreFixture {
    _dir: TempDir,
    pub paths: StorePaths,
    pub classes: Vec<(String, Vec<Vec<f32>>)>,
}

impl StoreFixture {
    pub fn store(&self) -> Arc<EmbeddingStore> {
        Arc::new(EmbeddingStore::new(self.paths.clone(), FIXTURE_OPTIONS))
    }

    pub fn engine(&self, settings: RetrievalSettings) -> RetrievalEngine {
        RetrievalEngine::new(self.store(), settings).expect("valid settings")
    }

    pub fn dim(&self) -> usize {
        self.classes.first().map(|(_, rows)| rows[0].len()).unwrap_or(0)
    }
}

pub fn write_classes(path: &Path, classes: &[(String, Vec<Vec<f32>>)]) {
    let shapes: Vec<[usize; 2]> = classes
        .iter()
        .map(|(_, rows)| [rows.len(), rows[0].len()])
        .collect();
    let data: Vec<Vec<f32>> = classes
        .iter()
        .map(|(_, rows)| rows.iter().flatten().copied().collect())
        .collect();

    write_npz_file(
        path,
        classes
            .iter()
            .zip(&shapes)
            .zip(&data)
            .map(|(((label, _), shape), data)| (label.as_str(), &shape[..], data.as_slice())),
    )
    .expect("write bank");
}

/// The three-class store of the A > C > B ranking scenario.
pub fn s1_store(centroids: Centroids) -> StoreFixture {
    StoreFixtureBuilder::new()
        .class("A", vec![vec![1.0, 0.0]])
        .class("B", vec![vec![0.0, 1.0]])
        .class("C", vec![vec![0.7, 0.7]])
        .centroids(centroids)
        .build()
}

/// A and B nearly tied for `[1, 0]`, C far behind.
pub fn ambiguous_store() -> StoreFixture {
    StoreFixtureBuilder::new()
        .class("A", vec![vec![1.0, 0.0]])
        .class("B", vec![vec![0.99, 0.1411]])
        .class("C", vec![vec![0.0, 1.0]])
        .build()
}

/// Deterministic vector with components in `[-1, 1)`.
pub fn seeded_vector(seed: u64, dim: usize) -> Vec<f32> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    (0..dim)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        })
        .collect()
}

pub fn image() -> VerifierPayload {
    VerifierPayload::png(vec![0x89, b'P', b'N', b'G'])
}
