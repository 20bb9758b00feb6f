//! Featurization client contract.
//!
//! A [`Featurizer`] turns an ordered list of molecule keys into one embedding
//! row per key. The sync engine treats it as all-or-nothing per call: either
//! every key gets a row, or the call fails and nothing is written.
//!
//! Implementations:
//! - [`BatchedFeaturizer`]: splits one call into bounded sub-batches
//! - [`HashFeaturizer`]: deterministic stub derived from key hashes
//! - [`CommandFeaturizer`]: delegates to an external program

mod batched;
mod command;
mod hash;

pub use batched::BatchedFeaturizer;
pub use command::CommandFeaturizer;
pub use hash::HashFeaturizer;

use featstore_core::{EmbeddingMatrix, Result};

/// Produces fixed-width embeddings for molecule keys.
///
/// `embed` must return exactly `keys.len()` rows of width [`Featurizer::dim`],
/// in the same order as `keys`, and must be deterministic for a fixed key.
/// An all-zero row is allowed and is reported by the sync engine as a
/// featurization failure for that key.
pub trait Featurizer {
    /// Width of every embedding row
    fn dim(&self) -> usize;

    /// Embed `keys`, one row per key
    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix>;
}

impl<F: Featurizer + ?Sized> Featurizer for &F {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        (**self).embed(keys)
    }
}

impl<F: Featurizer + ?Sized> Featurizer for Box<F> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        (**self).embed(keys)
    }
}
