//! Durability layer for featstore
//!
//! This crate handles everything that touches disk:
//!
//! - Binary on-disk format of the feature table (header, commit slots, batches)
//! - Crash-safe create (write-fsync-rename) and whole-batch appends
//! - Key-only reads that never load the embedding column

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod format; // Binary on-disk format
pub mod table; // Feature table handle and path-level operations

pub use format::{
    BatchError, BatchHeader, CommitSlot, TableHeader, INPUTS_COLUMN, TABLE_FORMAT_VERSION,
    TABLE_MAGIC, VALUES_COLUMN,
};
pub use table::{append, create, dim, exists, read_all, read_keys, remove, row_count, FeatureTable};
