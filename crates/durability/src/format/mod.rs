//! Binary on-disk format of the feature table
//!
//! - `header`: file header and the two alternating commit slots
//! - `batch`: one batch per create/append, both columns side by side

pub mod batch;
pub mod header;

pub use batch::{
    decode_keys, decode_values, encode_batch, BatchError, BatchHeader, BATCH_HEADER_SIZE,
    INPUTS_COLUMN, VALUES_COLUMN,
};
pub use header::{
    CommitSlot, TableHeader, COMMIT_SLOT_SIZE, DATA_START, TABLE_FORMAT_VERSION,
    TABLE_HEADER_SIZE, TABLE_MAGIC,
};
