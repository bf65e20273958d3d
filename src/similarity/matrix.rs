use thiserror::Error;

use super::l2_normalize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{len} values cannot be split into rows of width {dim}")]
pub struct MatrixShapeError {
    pub dim: usize,
    pub len: usize,
}

/// Dense row-major `f32` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn new(dim: usize, data: Vec<f32>) -> Result<Self, MatrixShapeError> {
        if dim == 0 || !data.len().is_multiple_of(dim) {
            return Err(MatrixShapeError {
                dim,
                len: data.len(),
            });
        }
        Ok(Self {
            rows: data.len() / dim,
            dim,
            data,
        })
    }

    pub fn empty(dim: usize) -> Self {
        Self {
            rows: 0,
            dim,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        self.data.chunks_exact(self.dim.max(1))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Appends one row; fails when its width differs from the matrix width.
    pub fn push_row(&mut self, row: &[f32]) -> Result<(), MatrixShapeError> {
        if row.len() != self.dim {
            return Err(MatrixShapeError {
                dim: self.dim,
                len: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn normalize_rows(&mut self) {
        if self.dim == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(self.dim) {
            l2_normalize(row);
        }
    }

    /// Component-wise mean of all rows, or `None` for an empty matrix.
    pub fn mean_row(&self) -> Option<Vec<f32>> {
        if self.rows == 0 {
            return None;
        }
        let mut mean = vec![0.0f32; self.dim];
        for row in self.iter_rows() {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        let n = self.rows as f32;
        for m in mean.iter_mut() {
            *m /= n;
        }
        Some(mean)
    }
}
