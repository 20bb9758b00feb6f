//! featstore - incremental, append-only feature store for molecule embeddings
//!
//! featstore computes a fixed-width embedding for each molecule key exactly
//! once and keeps the (key, embedding) pairs in a single on-disk table that
//! grows by whole batches.
//!
//! # Quick Start
//!
//! ```ignore
//! use featstore::{HashFeaturizer, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::new("features.fst", 64).with_chunk_size(1000);
//! let engine = SyncEngine::new(HashFeaturizer::new(64), config)?;
//!
//! // Featurizes only keys the table does not hold yet
//! let report = engine.sync(&keys)?;
//!
//! let (values, inputs) = featstore::table::read_all("features.fst")?;
//! ```
//!
//! # Architecture
//!
//! - `featstore-core`: shared types and the error hierarchy
//! - `featstore-durability`: the feature table file (create, append, reads)
//! - `featstore-engine`: featurizers, key sources, config, and the sync loop

pub use featstore_core::{EmbeddingMatrix, FeatureStoreError, MoleculeKey, Result};
pub use featstore_durability::table;
pub use featstore_durability::FeatureTable;
pub use featstore_engine::*;
