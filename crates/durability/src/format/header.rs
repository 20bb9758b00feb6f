//! Feature table file header and commit slots.
//!
//! # File Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ File Header (32 bytes)             │  offset 0
//! ├────────────────────────────────────┤
//! │ Commit Slot 0 (32 bytes)           │  offset 32
//! ├────────────────────────────────────┤
//! │ Commit Slot 1 (32 bytes)           │  offset 64
//! ├────────────────────────────────────┤
//! │ Batch 1                            │  offset 96
//! ├────────────────────────────────────┤
//! │ Batch 2                            │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! The header is written once when the table is created and never changes.
//! Commits alternate between the two slots: commit `n` lands in slot `n % 2`,
//! so the previous commit stays intact while the next one is being written.
//! The slot with the highest sequence and a valid CRC is authoritative.

use crc32fast::Hasher;

/// Magic bytes identifying a feature table file: "FSTB"
pub const TABLE_MAGIC: [u8; 4] = *b"FSTB";

/// Current table format version
pub const TABLE_FORMAT_VERSION: u32 = 1;

/// Size of the file header in bytes
pub const TABLE_HEADER_SIZE: usize = 32;

/// Size of one commit slot in bytes
pub const COMMIT_SLOT_SIZE: usize = 32;

/// Byte offset of the first batch
pub const DATA_START: u64 = (TABLE_HEADER_SIZE + 2 * COMMIT_SLOT_SIZE) as u64;

/// Feature table file header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    /// Magic bytes: "FSTB"
    pub magic: [u8; 4],

    /// Format version for forward compatibility
    pub format_version: u32,

    /// Width of every row in the `Values` column
    pub dim: u32,
}

impl TableHeader {
    /// Create a header for a table of the given width.
    pub fn new(dim: u32) -> Self {
        TableHeader {
            magic: TABLE_MAGIC,
            format_version: TABLE_FORMAT_VERSION,
            dim,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; TABLE_HEADER_SIZE] {
        let mut bytes = [0u8; TABLE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.dim.to_le_bytes());
        // 12..32 reserved
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8; TABLE_HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        TableHeader {
            magic,
            format_version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            dim: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    /// Validate the header has correct magic bytes.
    pub fn is_valid(&self) -> bool {
        self.magic == TABLE_MAGIC
    }
}

/// One commit record: how much of the file is committed.
///
/// Bytes past `data_end` belong to an append that never committed and are
/// ignored by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSlot {
    /// Commit sequence number, starts at 1
    pub sequence: u64,

    /// Rows in both columns as of this commit
    pub rows: u64,

    /// Byte offset just past the last committed batch
    pub data_end: u64,
}

impl CommitSlot {
    /// Create a commit slot.
    pub fn new(sequence: u64, rows: u64, data_end: u64) -> Self {
        CommitSlot {
            sequence,
            rows,
            data_end,
        }
    }

    /// The commit that follows this one after appending `rows` rows in
    /// `batch_len` bytes.
    pub fn next(&self, rows: u64, batch_len: u64) -> Self {
        CommitSlot {
            sequence: self.sequence + 1,
            rows: self.rows + rows,
            data_end: self.data_end + batch_len,
        }
    }

    /// Slot index (0 or 1) this commit is written to.
    pub fn slot_index(&self) -> usize {
        (self.sequence % 2) as usize
    }

    /// File offset of the slot this commit is written to.
    pub fn slot_offset(&self) -> u64 {
        (TABLE_HEADER_SIZE + self.slot_index() * COMMIT_SLOT_SIZE) as u64
    }

    /// Serialize slot to bytes.
    ///
    /// Format: sequence (8) + rows (8) + data_end (8) + crc32 (4) + reserved (4)
    pub fn to_bytes(&self) -> [u8; COMMIT_SLOT_SIZE] {
        let mut bytes = [0u8; COMMIT_SLOT_SIZE];
        bytes[0..8].copy_from_slice(&self.sequence.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.rows.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.data_end.to_le_bytes());
        let crc = Self::compute_crc(&bytes[0..24]);
        bytes[24..28].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// Deserialize a slot, returning `None` if it was never written or its
    /// checksum does not match (torn slot write).
    pub fn from_bytes(bytes: &[u8; COMMIT_SLOT_SIZE]) -> Option<Self> {
        let stored_crc = u32::from_le_bytes(bytes[24..28].try_into().ok()?);
        if Self::compute_crc(&bytes[0..24]) != stored_crc {
            return None;
        }
        let slot = CommitSlot {
            sequence: u64::from_le_bytes(bytes[0..8].try_into().ok()?),
            rows: u64::from_le_bytes(bytes[8..16].try_into().ok()?),
            data_end: u64::from_le_bytes(bytes[16..24].try_into().ok()?),
        };
        if slot.sequence == 0 || slot.data_end < DATA_START {
            return None;
        }
        Some(slot)
    }

    /// Pick the authoritative commit out of the two slots.
    pub fn latest(a: Option<CommitSlot>, b: Option<CommitSlot>) -> Option<CommitSlot> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if a.sequence >= b.sequence { a } else { b }),
            (a, b) => a.or(b),
        }
    }

    fn compute_crc(data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}
