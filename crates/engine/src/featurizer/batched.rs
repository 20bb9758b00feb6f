//! Sub-batching wrapper around another featurizer.

use super::Featurizer;
use featstore_core::{EmbeddingMatrix, FeatureStoreError, Result};
use tracing::debug;

/// Splits each `embed` call into consecutive sub-batches of at most
/// `batch_size` keys and stitches the results back together in order.
///
/// Bounds the per-call overhead of the inner featurizer (process size,
/// model memory) independently of the sync engine's write chunk size.
/// The first failing sub-batch fails the whole call.
#[derive(Debug, Clone)]
pub struct BatchedFeaturizer<F> {
    inner: F,
    batch_size: usize,
}

impl<F: Featurizer> BatchedFeaturizer<F> {
    /// Wrap `inner`; `batch_size` must be positive
    pub fn new(inner: F, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(FeatureStoreError::InvalidConfig(
                "featurizer batch size must be positive".to_string(),
            ));
        }
        Ok(BatchedFeaturizer { inner, batch_size })
    }

    /// Sub-batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The wrapped featurizer
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: Featurizer> Featurizer for BatchedFeaturizer<F> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        let dim = self.inner.dim();
        let mut out = EmbeddingMatrix::empty(dim);

        for (index, batch) in keys.chunks(self.batch_size).enumerate() {
            let values = self.inner.embed(batch)?;
            if values.rows() != batch.len() {
                return Err(FeatureStoreError::shape(
                    "featurizer output rows",
                    batch.len(),
                    values.rows(),
                ));
            }
            out.extend(&values)?;
            debug!(
                target: "featstore::featurizer",
                batch = index,
                rows = batch.len(),
                done = out.rows(),
                total = keys.len(),
                "Embedded sub-batch"
            );
        }

        Ok(out)
    }
}
