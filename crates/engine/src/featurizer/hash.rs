//! Deterministic hash-based featurizer.

use super::Featurizer;
use featstore_core::{EmbeddingMatrix, Result};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Stub featurizer: element `j` of a key's row is derived from
/// `xxh3(key, seed = j)` and lies in `[-1, 1)`.
///
/// Same key, same row, on every machine. Useful for tests, demos, and for
/// exercising the store without a real model.
#[derive(Debug, Clone, Copy)]
pub struct HashFeaturizer {
    dim: usize,
}

impl HashFeaturizer {
    /// Create a featurizer producing rows of width `dim`
    pub fn new(dim: usize) -> Self {
        HashFeaturizer { dim }
    }

    /// Embedding of a single key
    pub fn embed_one(&self, key: &str) -> Vec<f32> {
        (0..self.dim)
            .map(|j| {
                let h = xxh3_64_with_seed(key.as_bytes(), j as u64);
                // Top 24 bits give an exactly representable f32 fraction
                (h >> 40) as f32 / (1u64 << 23) as f32 - 1.0
            })
            .collect()
    }
}

impl Featurizer for HashFeaturizer {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        let mut data = Vec::with_capacity(keys.len() * self.dim);
        for key in keys {
            data.extend(self.embed_one(key));
        }
        EmbeddingMatrix::new(keys.len(), self.dim, data)
    }
}
