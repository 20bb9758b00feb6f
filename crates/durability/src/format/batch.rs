//! Batch record format.
//!
//! Every create or append writes exactly one batch. A batch carries the
//! rows of both columns so they can never drift apart on disk.
//!
//! # Batch Layout
//!
//! ```text
//! ┌───────────┬───────────────┬───────────────┬─────────────────┐
//! │ Rows (4)  │ Keys Len (4)  │ Keys CRC (4)  │ Values CRC (4)  │
//! ├───────────┴───────────────┴───────────────┴─────────────────┤
//! │ Inputs block: per row [Len: u32 LE][UTF-8 bytes]            │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Values block: rows * dim * f32 LE                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two blocks are checksummed separately so the key column can be read
//! and verified without touching the values block.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use featstore_core::EmbeddingMatrix;
use std::io::Cursor;

/// Size of the batch header in bytes
pub const BATCH_HEADER_SIZE: usize = 16;

/// Name of the embedding matrix column
pub const VALUES_COLUMN: &str = "Values";
/// Name of the molecule key column
pub const INPUTS_COLUMN: &str = "Inputs";

/// Fixed-size header in front of every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchHeader {
    /// Rows in this batch
    pub rows: u32,
    /// Byte length of the Inputs block
    pub keys_len: u32,
    /// CRC32 of the Inputs block
    pub keys_crc: u32,
    /// CRC32 of the Values block
    pub values_crc: u32,
}

impl BatchHeader {
    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; BATCH_HEADER_SIZE] {
        let mut bytes = [0u8; BATCH_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.rows.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.keys_len.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.keys_crc.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.values_crc.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8; BATCH_HEADER_SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        BatchHeader {
            rows: word(0),
            keys_len: word(4),
            keys_crc: word(8),
            values_crc: word(12),
        }
    }

    /// Byte length of the Values block for a table of width `dim`.
    pub fn values_len(&self, dim: u32) -> u64 {
        self.rows as u64 * dim as u64 * 4
    }

    /// Total on-disk size of this batch, header included.
    pub fn total_len(&self, dim: u32) -> u64 {
        BATCH_HEADER_SIZE as u64 + self.keys_len as u64 + self.values_len(dim)
    }
}

/// Encode one batch (header + Inputs block + Values block).
///
/// Callers must have checked that `keys.len() == values.rows()`.
pub fn encode_batch(keys: &[String], values: &EmbeddingMatrix) -> Result<Vec<u8>, BatchError> {
    let rows = u32::try_from(keys.len()).map_err(|_| BatchError::TooLarge)?;

    let mut key_block = Vec::with_capacity(keys.iter().map(|k| k.len() + 4).sum());
    for key in keys {
        let len = u32::try_from(key.len()).map_err(|_| BatchError::TooLarge)?;
        key_block.write_u32::<LittleEndian>(len)?;
        key_block.extend_from_slice(key.as_bytes());
    }
    let keys_len = u32::try_from(key_block.len()).map_err(|_| BatchError::TooLarge)?;

    let mut value_block = Vec::with_capacity(values.as_slice().len() * 4);
    for &v in values.as_slice() {
        value_block.write_f32::<LittleEndian>(v)?;
    }

    let header = BatchHeader {
        rows,
        keys_len,
        keys_crc: compute_crc(&key_block),
        values_crc: compute_crc(&value_block),
    };

    let mut out = Vec::with_capacity(BATCH_HEADER_SIZE + key_block.len() + value_block.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&key_block);
    out.extend_from_slice(&value_block);
    Ok(out)
}

/// Verify and decode an Inputs block.
pub fn decode_keys(header: &BatchHeader, block: &[u8]) -> Result<Vec<String>, BatchError> {
    verify(INPUTS_COLUMN, header.keys_crc, block)?;

    let mut cursor = Cursor::new(block);
    let mut keys = Vec::with_capacity(header.rows as usize);
    for _ in 0..header.rows {
        let len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| BatchError::Truncated(INPUTS_COLUMN))? as usize;
        let start = cursor.position() as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= block.len())
            .ok_or(BatchError::Truncated(INPUTS_COLUMN))?;
        let key = std::str::from_utf8(&block[start..end])
            .map_err(|e| BatchError::InvalidKey(e.to_string()))?;
        keys.push(key.to_string());
        cursor.set_position(end as u64);
    }

    if cursor.position() as usize != block.len() {
        return Err(BatchError::TrailingBytes(INPUTS_COLUMN));
    }
    Ok(keys)
}

/// Verify and decode a Values block into row-major floats.
pub fn decode_values(header: &BatchHeader, dim: u32, block: &[u8]) -> Result<Vec<f32>, BatchError> {
    verify(VALUES_COLUMN, header.values_crc, block)?;
    if block.len() as u64 != header.values_len(dim) {
        return Err(BatchError::Truncated(VALUES_COLUMN));
    }

    let mut cursor = Cursor::new(block);
    let mut values = Vec::with_capacity(block.len() / 4);
    for _ in 0..block.len() / 4 {
        values.push(cursor.read_f32::<LittleEndian>()?);
    }
    Ok(values)
}

fn verify(column: &'static str, expected: u32, block: &[u8]) -> Result<(), BatchError> {
    let computed = compute_crc(block);
    if computed != expected {
        return Err(BatchError::ChecksumMismatch {
            column,
            expected,
            computed,
        });
    }
    Ok(())
}

fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Batch encoding/decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Checksum verification failed
    #[error("{column} checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Column whose block failed verification
        column: &'static str,
        /// Expected checksum from the batch header
        expected: u32,
        /// Computed checksum
        computed: u32,
    },

    /// Block ended before all rows were read
    #[error("{0} block is truncated")]
    Truncated(&'static str),

    /// Block has bytes left over after all rows were read
    #[error("{0} block has trailing bytes")]
    TrailingBytes(&'static str),

    /// Stored key is not valid UTF-8
    #[error("Invalid key encoding: {0}")]
    InvalidKey(String),

    /// Batch or key does not fit the 32-bit length fields
    #[error("Batch too large for the table format")]
    TooLarge,

    /// I/O error while encoding
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
