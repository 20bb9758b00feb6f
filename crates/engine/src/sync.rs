//! Incremental sync engine.
//!
//! A sync run brings the feature table up to date with a master key list:
//!
//! 1. Rebuild mode deletes the table; append mode reads its `Inputs` column.
//! 2. The to-do list is the master list minus stored keys, in master order.
//! 3. The to-do list is cut into chunks of at most `chunk_size` keys.
//! 4. Each chunk is featurized with one call and written with one
//!    create (first chunk of a fresh table) or append.
//!
//! Every chunk is durable before the next one starts, so an interrupted run
//! loses at most the chunk in flight. Running sync again in append mode
//! picks up exactly where the last committed chunk left off. Errors are not
//! retried; they propagate to the caller with the table at its last commit.
//!
//! The run is single-threaded and blocking. There is no timeout on the
//! featurizer: if it hangs, the run hangs.

use crate::config::SyncConfig;
use crate::featurizer::{BatchedFeaturizer, Featurizer};
use crate::source::{load_candidates, KeyFilter};
use featstore_core::{FeatureStoreError, Result};
use featstore_durability::table;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys in the master list
    pub candidates: usize,
    /// Master-list entries skipped because the table already holds them
    pub already_present: usize,
    /// Keys that needed featurizing at the start of the run
    pub todo: usize,
    /// Chunks created or appended
    pub chunks_written: usize,
    /// Rows written by this run
    pub rows_written: usize,
    /// All-zero embedding rows written by this run
    pub zero_rows: usize,
    /// Whether this run created the table
    pub created: bool,
    /// Rows in the table when the run finished
    pub final_rows: u64,
}

impl SyncReport {
    /// True if the run wrote nothing
    pub fn is_noop(&self) -> bool {
        self.rows_written == 0
    }
}

/// Keys of `master` not present in `existing`, in master order.
///
/// Duplicates within `master` are kept: each copy is its own to-do item.
pub fn plan_todo(master: &[String], existing: &[String]) -> Vec<String> {
    let done: HashSet<&str> = existing.iter().map(String::as_str).collect();
    master
        .iter()
        .filter(|k| !done.contains(k.as_str()))
        .cloned()
        .collect()
}

/// Drives featurization and table writes for one table.
pub struct SyncEngine<F> {
    featurizer: F,
    config: SyncConfig,
}

impl<F: Featurizer> SyncEngine<F> {
    /// Create an engine; validates `config` and the featurizer's width against it.
    pub fn new(featurizer: F, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        if featurizer.dim() != config.embedding_dim {
            return Err(FeatureStoreError::shape(
                "featurizer width",
                config.embedding_dim,
                featurizer.dim(),
            ));
        }
        Ok(SyncEngine { featurizer, config })
    }

    /// Create an engine whose featurizer is split into `embed_batch_size` sub-batches.
    pub fn batched(featurizer: F, config: SyncConfig) -> Result<SyncEngine<BatchedFeaturizer<F>>> {
        let batched = BatchedFeaturizer::new(featurizer, config.embed_batch_size)?;
        SyncEngine::new(batched, config)
    }

    /// The configuration in use
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The featurizer in use
    pub fn featurizer(&self) -> &F {
        &self.featurizer
    }

    /// Read the master list from `path` (with the configured cap and an
    /// optional filter) and sync it.
    pub fn sync_from_file(
        &self,
        path: impl AsRef<Path>,
        filter: Option<&dyn KeyFilter>,
    ) -> Result<SyncReport> {
        let keys = load_candidates(path, self.config.max_molecules, filter)?;
        self.sync(&keys)
    }

    /// Bring the table up to date with `master_keys`.
    pub fn sync(&self, master_keys: &[String]) -> Result<SyncReport> {
        let path = self.config.store_path.as_path();
        let mut report = SyncReport {
            candidates: master_keys.len(),
            ..Default::default()
        };

        let (todo, mut store_exists) = if !self.config.append {
            if table::remove(path)? {
                info!(
                    target: "featstore::sync",
                    path = %path.display(),
                    "Removed existing feature table for rebuild"
                );
            }
            (master_keys.to_vec(), false)
        } else {
            match table::dim(path)? {
                Some(dim) => {
                    if dim != self.config.embedding_dim {
                        return Err(FeatureStoreError::shape(
                            "embedding width",
                            dim,
                            self.config.embedding_dim,
                        ));
                    }
                    let existing = table::read_keys(path)?;
                    (plan_todo(master_keys, &existing), true)
                }
                None => (master_keys.to_vec(), false),
            }
        };

        report.todo = todo.len();
        report.already_present = master_keys.len() - todo.len();
        info!(
            target: "featstore::sync",
            path = %path.display(),
            candidates = report.candidates,
            already_present = report.already_present,
            remaining = report.todo,
            "Sync started"
        );

        for (index, chunk) in todo.chunks(self.config.chunk_size).enumerate() {
            let rows_before = table::row_count(path)?.unwrap_or(0);
            debug!(
                target: "featstore::sync",
                chunk = index,
                keys = chunk.len(),
                rows = rows_before,
                "Featurizing chunk"
            );

            let values = self.featurizer.embed(chunk)?;
            if values.rows() != chunk.len() {
                return Err(FeatureStoreError::shape(
                    "featurizer output rows",
                    chunk.len(),
                    values.rows(),
                ));
            }
            if values.dim() != self.config.embedding_dim {
                return Err(FeatureStoreError::shape(
                    "embedding width",
                    self.config.embedding_dim,
                    values.dim(),
                ));
            }

            let zeros = values.zero_rows();
            if zeros > 0 {
                warn!(
                    target: "featstore::sync",
                    chunk = index,
                    zero_rows = zeros,
                    "Chunk contains all-zero embeddings"
                );
            }
            report.zero_rows += zeros;

            let rows_after = if store_exists {
                table::append(path, &values, chunk)?
            } else {
                table::create(path, &values, chunk, false)?;
                store_exists = true;
                report.created = true;
                chunk.len() as u64
            };
            // Single writer: the table must have grown by exactly this chunk
            let expected = rows_before + chunk.len() as u64;
            if rows_after != expected {
                return Err(FeatureStoreError::corrupted(
                    path,
                    format!(
                        "expected {} rows after chunk {}, table holds {}",
                        expected, index, rows_after
                    ),
                ));
            }
            report.chunks_written += 1;
            report.rows_written += chunk.len();
        }

        report.final_rows = table::row_count(path)?.unwrap_or(0);
        info!(
            target: "featstore::sync",
            chunks = report.chunks_written,
            rows_written = report.rows_written,
            zero_rows = report.zero_rows,
            total_rows = report.final_rows,
            "Sync finished"
        );
        Ok(report)
    }
}

/// Sync `master_keys` into the table at `store_path` using `featurizer`.
///
/// The embedding width is taken from the featurizer; `chunk_size` is both
/// the append granularity and the featurizer call size.
pub fn sync<F: Featurizer>(
    master_keys: &[String],
    store_path: impl AsRef<Path>,
    chunk_size: usize,
    append_mode: bool,
    featurizer: F,
) -> Result<SyncReport> {
    let config = SyncConfig::new(store_path.as_ref(), featurizer.dim())
        .with_chunk_size(chunk_size)
        .with_embed_batch_size(chunk_size)
        .with_append(append_mode);
    SyncEngine::new(featurizer, config)?.sync(master_keys)
}
