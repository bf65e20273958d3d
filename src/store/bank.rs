//! In-memory class bank and centroid index.
//!
//! Both are built once from decoded NPZ members and never mutated afterwards. Every row is
//! L2-normalized on the way in. Members that cannot take part in exact scoring (wrong rank,
//! wrong width, non-finite values) are dropped here with a warning so the query path can rely
//! on a single width and finite data.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::similarity::{Matrix, all_finite, l2_normalize};
use crate::storage::{NpyArray, StorageResult, write_npz_file};

/// Samples of one class.
#[derive(Debug, Clone)]
pub struct ClassSamples {
    label: String,
    samples: Matrix,
}

impl ClassSamples {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn samples(&self) -> &Matrix {
        &self.samples
    }
}

/// Class id -> normalized sample matrix, in file order.
#[derive(Debug, Clone, Default)]
pub struct ClassBank {
    dim: usize,
    classes: Vec<ClassSamples>,
    index: HashMap<String, usize>,
}

impl ClassBank {
    /// Builds a bank from decoded archive members.
    ///
    /// Classes with fewer than `min_samples` rows are left out. The first accepted class fixes
    /// the bank width.
    pub fn from_arrays(arrays: Vec<(String, NpyArray)>, min_samples: usize) -> Self {
        let mut bank = Self::default();
        let min_rows = min_samples.max(1);

        for (label, array) in arrays {
            let [rows, dim] = match *array.shape() {
                [rows, dim] => [rows, dim],
                _ => {
                    warn!(class = %label, shape = ?array.shape(), "Skipping class: samples must be 2-D");
                    continue;
                }
            };

            if rows < min_rows {
                debug!(class = %label, rows, min_samples = min_rows, "Skipping class: too few samples");
                continue;
            }

            if dim == 0 || (bank.dim != 0 && dim != bank.dim) {
                warn!(class = %label, expected_dim = bank.dim, actual_dim = dim, "Skipping class: width mismatch");
                continue;
            }

            if bank.index.contains_key(&label) {
                warn!(class = %label, "Skipping duplicate class");
                continue;
            }

            if !all_finite(array.data()) {
                warn!(class = %label, "Skipping class: non-finite sample values");
                continue;
            }

            let Ok(mut samples) = Matrix::new(dim, array.into_data()) else {
                warn!(class = %label, "Skipping class: ragged sample data");
                continue;
            };
            samples.normalize_rows();

            bank.dim = dim;
            bank.index.insert(label.clone(), bank.classes.len());
            bank.classes.push(ClassSamples { label, samples });
        }

        bank
    }

    /// Width shared by every class; 0 for an empty bank.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&Matrix> {
        self.index.get(label).map(|&i| &self.classes[i].samples)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn labels(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.classes.iter().map(|c| c.label.as_str())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ClassSamples> + '_ {
        self.classes.iter()
    }

    pub fn total_samples(&self) -> usize {
        self.classes.iter().map(|c| c.samples.rows()).sum()
    }

    /// Per-class mean of the normalized samples, re-normalized, in bank order.
    pub fn compute_centroids(&self) -> CentroidIndex {
        let mut index = CentroidIndex {
            labels: Vec::with_capacity(self.classes.len()),
            matrix: Matrix::empty(self.dim),
        };

        for class in &self.classes {
            let Some(mut mean) = class.samples.mean_row() else {
                continue;
            };
            l2_normalize(&mut mean);
            if index.matrix.push_row(&mean).is_ok() {
                index.labels.push(class.label.clone());
            }
        }

        index
    }
}

/// Class id -> one representative unit vector.
#[derive(Debug, Clone)]
pub struct CentroidIndex {
    labels: Vec<String>,
    matrix: Matrix,
}

impl Default for CentroidIndex {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            matrix: Matrix::empty(0),
        }
    }
}

impl CentroidIndex {
    /// Builds an index from decoded archive members.
    ///
    /// Accepts `(1, D)` and `(D,)` members; for `(k, D)` only the first row is kept.
    pub fn from_arrays(arrays: Vec<(String, NpyArray)>) -> Self {
        let mut index = Self::default();

        for (label, array) in arrays {
            let row = match *array.shape() {
                [dim] if dim > 0 => array.data(),
                [rows, dim] if rows > 0 && dim > 0 => {
                    if rows > 1 {
                        debug!(class = %label, rows, "Centroid has several rows, using the first");
                    }
                    &array.data()[..dim]
                }
                _ => {
                    warn!(class = %label, shape = ?array.shape(), "Skipping centroid: unsupported shape");
                    continue;
                }
            };

            if index.labels.is_empty() {
                index.matrix = Matrix::empty(row.len());
            } else if row.len() != index.matrix.dim() {
                warn!(class = %label, expected_dim = index.matrix.dim(), actual_dim = row.len(), "Skipping centroid: width mismatch");
                continue;
            }

            if index.labels.iter().any(|l| *l == label) {
                warn!(class = %label, "Skipping duplicate centroid");
                continue;
            }

            if !all_finite(row) {
                warn!(class = %label, "Skipping centroid: non-finite values");
                continue;
            }

            let mut row = row.to_vec();
            l2_normalize(&mut row);
            if index.matrix.push_row(&row).is_ok() {
                index.labels.push(label);
            }
        }

        index
    }

    pub fn dim(&self) -> usize {
        self.matrix.dim()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }
}

/// Persists a bank as one `(N, D)` member per class.
pub fn write_bank(path: &Path, bank: &ClassBank) -> StorageResult<()> {
    let shapes: Vec<[usize; 2]> = bank
        .iter()
        .map(|c| [c.samples.rows(), c.samples.dim()])
        .collect();

    write_npz_file(
        path,
        bank.iter()
            .zip(&shapes)
            .map(|(c, shape)| (c.label.as_str(), &shape[..], c.samples.as_slice())),
    )
}

/// Persists centroids as one `(1, D)` member per class.
pub fn write_centroids(path: &Path, centroids: &CentroidIndex) -> StorageResult<()> {
    let shape = [1, centroids.dim()];
    write_npz_file(
        path,
        centroids
            .labels
            .iter()
            .zip(centroids.matrix.iter_rows())
            .map(|(label, row)| (label.as_str(), &shape[..], row)),
    )
}
