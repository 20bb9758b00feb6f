//! Persistent feature table
//!
//! A feature table is a single file holding two row-synchronized columns:
//! `Values` (R × D embeddings) and `Inputs` (R molecule keys). Row `i` of
//! one column always belongs to row `i` of the other.
//!
//! # Crash Safety
//!
//! Creation uses the write-fsync-rename pattern:
//! 1. Write header, commit slots and first batch to a temporary file
//! 2. fsync the temporary file
//! 3. Atomic rename to the final path
//! 4. fsync the parent directory
//!
//! Appends never touch committed bytes:
//! 1. Truncate anything past the committed end (left by an interrupted append)
//! 2. Write the new batch after the committed end and fsync
//! 3. Write the next commit into the inactive slot and fsync
//!
//! If the process dies before step 3 completes, the old commit is still the
//! authoritative one and the half-written batch is invisible to readers.
//!
//! No state is cached between calls: every free function opens the file,
//! reads what it needs from disk, and closes it again.

use crate::format::{
    decode_keys, decode_values, encode_batch, BatchError, BatchHeader, CommitSlot, TableHeader,
    BATCH_HEADER_SIZE, COMMIT_SLOT_SIZE, DATA_START, TABLE_FORMAT_VERSION, TABLE_HEADER_SIZE,
};
use featstore_core::{EmbeddingMatrix, FeatureStoreError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Open handle on a feature table file.
pub struct FeatureTable {
    path: PathBuf,
    file: File,
    header: TableHeader,
    commit: CommitSlot,
    writable: bool,
}

impl FeatureTable {
    /// Open an existing table for reading.
    pub fn open_read(path: &Path) -> Result<Self> {
        Self::open_with(path, false)
    }

    /// Open an existing table for appending.
    pub fn open_append(path: &Path) -> Result<Self> {
        Self::open_with(path, true)
    }

    fn open_with(path: &Path, writable: bool) -> Result<Self> {
        let mut file = match OpenOptions::new().read(true).write(writable).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FeatureStoreError::StoreNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len < DATA_START {
            return Err(FeatureStoreError::corrupted(
                path,
                format!("file is {} bytes, shorter than the {}-byte preamble", len, DATA_START),
            ));
        }

        let mut preamble = [0u8; DATA_START as usize];
        file.read_exact(&mut preamble)?;

        let mut header_bytes = [0u8; TABLE_HEADER_SIZE];
        header_bytes.copy_from_slice(&preamble[..TABLE_HEADER_SIZE]);
        let header = TableHeader::from_bytes(&header_bytes);

        if !header.is_valid() {
            return Err(FeatureStoreError::corrupted(path, "invalid magic bytes"));
        }
        if header.format_version != TABLE_FORMAT_VERSION {
            return Err(FeatureStoreError::corrupted(
                path,
                format!("unsupported format version {}", header.format_version),
            ));
        }
        if header.dim == 0 {
            return Err(FeatureStoreError::corrupted(path, "embedding width is zero"));
        }

        let slot = |index: usize| {
            let start = TABLE_HEADER_SIZE + index * COMMIT_SLOT_SIZE;
            let mut bytes = [0u8; COMMIT_SLOT_SIZE];
            bytes.copy_from_slice(&preamble[start..start + COMMIT_SLOT_SIZE]);
            CommitSlot::from_bytes(&bytes)
        };
        let commit = CommitSlot::latest(slot(0), slot(1))
            .ok_or_else(|| FeatureStoreError::corrupted(path, "no valid commit slot"))?;

        if commit.data_end > len {
            return Err(FeatureStoreError::corrupted(
                path,
                format!(
                    "committed end {} lies past end of file ({} bytes)",
                    commit.data_end, len
                ),
            ));
        }

        Ok(FeatureTable {
            path: path.to_path_buf(),
            file,
            header,
            commit,
            writable,
        })
    }

    /// Create a brand-new table whose initial content is `values`/`keys`.
    ///
    /// Fails with `StoreCreation` if `path` exists and `overwrite` is false,
    /// if the row counts of the two columns differ, or if the width is zero.
    /// Returns the new table opened for appending.
    pub fn create(
        path: &Path,
        values: &EmbeddingMatrix,
        keys: &[String],
        overwrite: bool,
    ) -> Result<Self> {
        if values.rows() != keys.len() {
            return Err(FeatureStoreError::creation(
                path,
                format!(
                    "{} embedding rows but {} keys",
                    values.rows(),
                    keys.len()
                ),
            ));
        }
        if values.dim() == 0 {
            return Err(FeatureStoreError::creation(path, "embedding width is zero"));
        }
        let dim = u32::try_from(values.dim())
            .map_err(|_| FeatureStoreError::creation(path, "embedding width exceeds u32"))?;
        if path.exists() && !overwrite {
            return Err(FeatureStoreError::creation(path, "file already exists"));
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| FeatureStoreError::creation(path, "path has no file name"))?;
        let parent = parent_dir(path);
        fs::create_dir_all(parent)?;
        let temp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
        if temp_path.exists() {
            fs::remove_file(&temp_path)?;
        }

        let batch = if keys.is_empty() {
            Vec::new()
        } else {
            encode_batch(keys, values).map_err(|e| FeatureStoreError::creation(path, e.to_string()))?
        };
        let commit = CommitSlot::new(1, keys.len() as u64, DATA_START + batch.len() as u64);

        let mut preamble = [0u8; DATA_START as usize];
        preamble[..TABLE_HEADER_SIZE].copy_from_slice(&TableHeader::new(dim).to_bytes());
        let offset = commit.slot_offset() as usize;
        preamble[offset..offset + COMMIT_SLOT_SIZE].copy_from_slice(&commit.to_bytes());

        // Step 1: Write to temporary file
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)?;
        file.write_all(&preamble)?;
        file.write_all(&batch)?;

        // Step 2: fsync the file
        file.sync_all()?;
        drop(file);

        // Step 3: Atomic rename
        fs::rename(&temp_path, path)?;

        // Step 4: fsync parent directory
        sync_dir(parent)?;

        debug!(
            target: "featstore::table",
            path = %path.display(),
            rows = keys.len(),
            dim = dim,
            "Created feature table"
        );

        Self::open_append(path)
    }

    /// Table path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Committed row count (same for both columns)
    pub fn rows(&self) -> u64 {
        self.commit.rows
    }

    /// Established embedding width
    pub fn dim(&self) -> usize {
        self.header.dim as usize
    }

    /// The commit currently in force
    pub fn commit(&self) -> CommitSlot {
        self.commit
    }

    /// Grow both columns by `values.rows()` rows.
    ///
    /// Returns the row count after the append. Appending zero rows is a no-op.
    pub fn append(&mut self, values: &EmbeddingMatrix, keys: &[String]) -> Result<u64> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "feature table was opened read-only",
            )
            .into());
        }
        if values.rows() != keys.len() {
            return Err(FeatureStoreError::shape(
                "batch rows (Values vs Inputs)",
                keys.len(),
                values.rows(),
            ));
        }
        if values.dim() != self.dim() {
            return Err(FeatureStoreError::shape(
                "embedding width",
                self.dim(),
                values.dim(),
            ));
        }
        if keys.is_empty() {
            return Ok(self.commit.rows);
        }

        let data_end = self.commit.data_end;
        let len = self.file.metadata()?.len();
        if len > data_end {
            warn!(
                target: "featstore::table",
                path = %self.path.display(),
                committed_end = data_end,
                file_len = len,
                "Discarding uncommitted tail left by an interrupted append"
            );
            self.file.set_len(data_end)?;
        }

        let batch = encode_batch(keys, values).map_err(|e| self.batch_error(data_end, e))?;
        self.file.seek(SeekFrom::Start(data_end))?;
        self.file.write_all(&batch)?;
        self.file.sync_all()?;

        let next = self.commit.next(keys.len() as u64, batch.len() as u64);
        self.file.seek(SeekFrom::Start(next.slot_offset()))?;
        self.file.write_all(&next.to_bytes())?;
        self.file.sync_all()?;
        self.commit = next;

        debug!(
            target: "featstore::table",
            path = %self.path.display(),
            appended = keys.len(),
            rows = next.rows,
            "Appended batch"
        );

        Ok(next.rows)
    }

    /// Read the full `Inputs` column in row order.
    ///
    /// The `Values` blocks are skipped, not read.
    pub fn read_keys(&self) -> Result<Vec<String>> {
        let (keys, _) = self.read_columns(false)?;
        Ok(keys)
    }

    /// Read both columns.
    pub fn read_all(&self) -> Result<(EmbeddingMatrix, Vec<String>)> {
        let (keys, values) = self.read_columns(true)?;
        let matrix = EmbeddingMatrix::new(keys.len(), self.dim(), values)?;
        Ok((matrix, keys))
    }

    fn read_columns(&self, with_values: bool) -> Result<(Vec<String>, Vec<f32>)> {
        let dim = self.header.dim;
        let data_end = self.commit.data_end;

        let mut reader = BufReader::new(&self.file);
        reader.seek(SeekFrom::Start(DATA_START))?;

        let mut keys = Vec::with_capacity(self.commit.rows as usize);
        let mut values = Vec::new();
        if with_values {
            values.reserve(self.commit.rows as usize * dim as usize);
        }

        let mut pos = DATA_START;
        while pos < data_end {
            let mut header_bytes = [0u8; BATCH_HEADER_SIZE];
            reader.read_exact(&mut header_bytes)?;
            let header = BatchHeader::from_bytes(&header_bytes);

            let end = pos + header.total_len(dim);
            if end > data_end {
                return Err(FeatureStoreError::corrupted(
                    &self.path,
                    format!(
                        "batch at offset {} ends at {}, past committed end {}",
                        pos, end, data_end
                    ),
                ));
            }

            let mut key_block = vec![0u8; header.keys_len as usize];
            reader.read_exact(&mut key_block)?;
            keys.extend(decode_keys(&header, &key_block).map_err(|e| self.batch_error(pos, e))?);

            let values_len = header.values_len(dim);
            if with_values {
                let mut value_block = vec![0u8; values_len as usize];
                reader.read_exact(&mut value_block)?;
                values.extend(
                    decode_values(&header, dim, &value_block)
                        .map_err(|e| self.batch_error(pos, e))?,
                );
            } else {
                reader.seek_relative(values_len as i64)?;
            }

            pos = end;
        }

        if keys.len() as u64 != self.commit.rows {
            return Err(FeatureStoreError::corrupted(
                &self.path,
                format!(
                    "commit records {} rows but batches hold {}",
                    self.commit.rows,
                    keys.len()
                ),
            ));
        }

        Ok((keys, values))
    }

    fn batch_error(&self, offset: u64, err: BatchError) -> FeatureStoreError {
        FeatureStoreError::corrupted(&self.path, format!("batch at offset {}: {}", offset, err))
    }
}

/// Create a new table at `path` holding `values`/`keys` as its first rows.
pub fn create(
    path: impl AsRef<Path>,
    values: &EmbeddingMatrix,
    keys: &[String],
    overwrite: bool,
) -> Result<()> {
    FeatureTable::create(path.as_ref(), values, keys, overwrite).map(|_| ())
}

/// Append rows to an existing table. Returns the row count afterwards.
pub fn append(path: impl AsRef<Path>, values: &EmbeddingMatrix, keys: &[String]) -> Result<u64> {
    FeatureTable::open_append(path.as_ref())?.append(values, keys)
}

/// All keys currently stored, in row order; empty if the table does not exist.
pub fn read_keys(path: impl AsRef<Path>) -> Result<Vec<String>> {
    match FeatureTable::open_read(path.as_ref()) {
        Ok(table) => table.read_keys(),
        Err(FeatureStoreError::StoreNotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Both columns of an existing table.
pub fn read_all(path: impl AsRef<Path>) -> Result<(EmbeddingMatrix, Vec<String>)> {
    FeatureTable::open_read(path.as_ref())?.read_all()
}

/// Committed row count from the preamble alone; `None` if the table does not exist.
pub fn row_count(path: impl AsRef<Path>) -> Result<Option<u64>> {
    match FeatureTable::open_read(path.as_ref()) {
        Ok(table) => Ok(Some(table.rows())),
        Err(FeatureStoreError::StoreNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Established embedding width; `None` if the table does not exist.
pub fn dim(path: impl AsRef<Path>) -> Result<Option<usize>> {
    match FeatureTable::open_read(path.as_ref()) {
        Ok(table) => Ok(Some(table.dim())),
        Err(FeatureStoreError::StoreNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether anything exists at `path`.
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Delete the table at `path`. Returns whether a file was removed.
pub fn remove(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => {
            sync_dir(parent_dir(path))?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}
