//! Shared test utilities for all integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::sync::Once;

pub use featstore::{
    table, EmbeddingMatrix, FeatureStoreError, FeatureTable, Featurizer, HashFeaturizer,
    Result, SyncConfig, SyncEngine, SyncReport,
};
use tempfile::TempDir;

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (shown for failing tests).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Owned string keys from literals
pub fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// `n` distinct keys: `C0`, `C1`, ...
pub fn numbered_keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("C{}", i)).collect()
}

// ============================================================================
// TestStore - temp directory holding one feature table path
// ============================================================================

/// A feature table path inside a temporary directory.
pub struct TestStore {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestStore {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("features.fst");
        TestStore { dir, path }
    }

    /// Config for this store with the given width and chunk size
    pub fn config(&self, dim: usize, chunk_size: usize) -> SyncConfig {
        SyncConfig::new(&self.path, dim).with_chunk_size(chunk_size)
    }

    pub fn keys(&self) -> Vec<String> {
        table::read_keys(&self.path).expect("read_keys failed")
    }

    pub fn read_all(&self) -> (EmbeddingMatrix, Vec<String>) {
        table::read_all(&self.path).expect("read_all failed")
    }

    pub fn bytes(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("read table file failed")
    }

    /// Number of commits the table has seen (1 create + N appends)
    pub fn commit_sequence(&self) -> u64 {
        FeatureTable::open_read(&self.path)
            .expect("open table failed")
            .commit()
            .sequence
    }
}

// ============================================================================
// Featurizer test doubles
// ============================================================================

/// Hash featurizer that records every call's keys.
pub struct RecordingFeaturizer {
    inner: HashFeaturizer,
    pub calls: RefCell<Vec<Vec<String>>>,
}

impl RecordingFeaturizer {
    pub fn new(dim: usize) -> Self {
        RecordingFeaturizer {
            inner: HashFeaturizer::new(dim),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls.borrow().iter().map(|c| c.len()).collect()
    }

    pub fn embedded_keys(&self) -> Vec<String> {
        self.calls.borrow().iter().flatten().cloned().collect()
    }
}

impl Featurizer for RecordingFeaturizer {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        self.calls.borrow_mut().push(keys.to_vec());
        self.inner.embed(keys)
    }
}

/// Hash featurizer that fails on call number `fail_on` (0-based).
pub struct FailingFeaturizer {
    inner: HashFeaturizer,
    fail_on: usize,
    calls: Cell<usize>,
}

impl FailingFeaturizer {
    pub fn new(dim: usize, fail_on: usize) -> Self {
        FailingFeaturizer {
            inner: HashFeaturizer::new(dim),
            fail_on,
            calls: Cell::new(0),
        }
    }
}

impl Featurizer for FailingFeaturizer {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == self.fail_on {
            return Err(FeatureStoreError::featurization(format!(
                "simulated failure on call {}",
                call
            )));
        }
        self.inner.embed(keys)
    }
}

/// Hash featurizer that returns an all-zero row for the listed keys.
pub struct ZeroingFeaturizer {
    inner: HashFeaturizer,
    zero_keys: Vec<String>,
}

impl ZeroingFeaturizer {
    pub fn new(dim: usize, zero_keys: &[&str]) -> Self {
        ZeroingFeaturizer {
            inner: HashFeaturizer::new(dim),
            zero_keys: keys(zero_keys),
        }
    }
}

impl Featurizer for ZeroingFeaturizer {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        let dim = self.inner.dim();
        let rows: Vec<Vec<f32>> = keys
            .iter()
            .map(|k| {
                if self.zero_keys.contains(k) {
                    vec![0.0; dim]
                } else {
                    self.inner.embed_one(k)
                }
            })
            .collect();
        EmbeddingMatrix::from_rows(dim, &rows)
    }
}

/// Assert that every stored row is the hash embedding of its stored key.
pub fn assert_rows_match_keys(store: &TestStore, dim: usize) {
    let (values, inputs) = store.read_all();
    assert_eq!(values.rows(), inputs.len(), "column row counts diverged");
    let reference = HashFeaturizer::new(dim);
    for (i, key) in inputs.iter().enumerate() {
        assert_eq!(
            values.row(i).unwrap(),
            &reference.embed_one(key)[..],
            "row {} does not belong to key {:?}",
            i,
            key
        );
    }
}

// ============================================================================
// File manipulation helpers
// ============================================================================

pub fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Append raw bytes to the end of a file (simulates a torn write).
pub fn append_garbage(path: &std::path::Path, bytes: &[u8]) {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .expect("Failed to open file for append");
    file.write_all(bytes).expect("Failed to append bytes");
    file.sync_all().expect("Failed to sync");
}

/// Overwrite bytes at `offset`.
pub fn corrupt_file_at_offset(path: &std::path::Path, offset: u64, bytes: &[u8]) {
    use std::io::{Seek, SeekFrom, Write};
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file for corruption");
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.write_all(bytes).expect("Failed to write corruption");
    file.sync_all().expect("Failed to sync");
}
