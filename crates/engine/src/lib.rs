//! Incremental sync engine for featstore
//!
//! Keeps a feature table in step with a master list of molecule keys,
//! featurizing each key once and appending the results chunk by chunk.
//!
//! - `featurizer`: the featurization client contract and its implementations
//! - `source`: master key list reading, filtering and export
//! - `config`: `featstore.toml` configuration
//! - `sync`: the diff / chunk / featurize / append loop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod featurizer;
pub mod source;
pub mod sync;

pub use config::{
    SyncConfig, CONFIG_FILE_NAME, DEFAULT_CHUNK_SIZE, DEFAULT_EMBEDDING_DIM,
    DEFAULT_EMBED_BATCH_SIZE,
};
pub use featurizer::{BatchedFeaturizer, CommandFeaturizer, Featurizer, HashFeaturizer};
pub use source::{load_candidates, read_master_keys, write_keys, KeyFilter, StandardizeFilter};
pub use sync::{plan_todo, sync, SyncEngine, SyncReport};
