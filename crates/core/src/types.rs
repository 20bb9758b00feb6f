//! Core data types: molecule keys and embedding matrices

use crate::error::{FeatureStoreError, Result};

/// Opaque identifier of one chemical structure (e.g. a SMILES string).
///
/// Equality is exact string equality; no canonicalization happens here.
pub type MoleculeKey = String;

/// Dense row-major `f32` matrix holding one embedding per row.
///
/// Row `i` is the embedding of the `i`-th key of whatever key list the
/// matrix travels with. The width (`dim`) is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Build a matrix from row-major data.
    ///
    /// Fails with `ShapeMismatch` if `data.len() != rows * dim`.
    pub fn new(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * dim {
            return Err(FeatureStoreError::shape(
                "matrix element count",
                rows * dim,
                data.len(),
            ));
        }
        Ok(EmbeddingMatrix { rows, dim, data })
    }

    /// All-zero matrix of the given shape
    pub fn zeros(rows: usize, dim: usize) -> Self {
        EmbeddingMatrix {
            rows,
            dim,
            data: vec![0.0; rows * dim],
        }
    }

    /// Empty matrix with a fixed width, ready to be extended
    pub fn empty(dim: usize) -> Self {
        Self::zeros(0, dim)
    }

    /// Build a matrix from individual rows, all of which must have width `dim`.
    pub fn from_rows<R: AsRef<[f32]>>(dim: usize, rows: &[R]) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(FeatureStoreError::shape("embedding width", dim, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(EmbeddingMatrix {
            rows: rows.len(),
            dim,
            data,
        })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Row width (embedding dimension)
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// True if the matrix has no rows
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `index`, or `None` if out of range
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// Iterate rows in order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact panics on 0, and a zero-width matrix has no data anyway
        let dim = self.dim.max(1);
        self.data
            .chunks_exact(dim)
            .take(if self.dim == 0 { 0 } else { self.rows })
    }

    /// Flat row-major view
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume into the flat row-major buffer
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Append all rows of `other` below this matrix.
    pub fn extend(&mut self, other: &EmbeddingMatrix) -> Result<()> {
        if other.dim != self.dim {
            return Err(FeatureStoreError::shape("embedding width", self.dim, other.dim));
        }
        self.data.extend_from_slice(&other.data);
        self.rows += other.rows;
        Ok(())
    }

    /// Count rows that are entirely zero.
    ///
    /// An all-zero row signals that the featurizer failed for that key.
    pub fn zero_rows(&self) -> usize {
        self.iter_rows()
            .filter(|row| row.iter().all(|&v| v == 0.0))
            .count()
    }
}
