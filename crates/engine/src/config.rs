//! Sync configuration via `featstore.toml`
//!
//! All knobs of a sync run live in one small TOML file. Every field has a
//! default, so an empty file is a valid configuration.

use featstore_core::{FeatureStoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "featstore.toml";

/// Default embedding width.
pub const DEFAULT_EMBEDDING_DIM: usize = 5000;

/// Default number of rows per create/append.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default number of keys per featurizer sub-batch.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 1_000;

/// Configuration of a sync run.
///
/// # Example
///
/// ```toml
/// store_path = "features.fst"
/// embedding_dim = 5000
/// chunk_size = 10000
/// embed_batch_size = 1000
/// append = true
/// # max_molecules = 100000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Path of the feature table file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Width of every embedding; must match an existing table
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Keys per chunk; each chunk is one featurizer call and one append
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Keys per featurizer sub-batch, at most `chunk_size`
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    /// Keep the existing table and add only missing keys (`false` rebuilds)
    #[serde(default = "default_append")]
    pub append: bool,
    /// Only the first `max_molecules` entries of the master list are used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_molecules: Option<usize>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("features.fst")
}

fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_embed_batch_size() -> usize {
    DEFAULT_EMBED_BATCH_SIZE
}

fn default_append() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            store_path: default_store_path(),
            embedding_dim: default_embedding_dim(),
            chunk_size: default_chunk_size(),
            embed_batch_size: default_embed_batch_size(),
            append: default_append(),
            max_molecules: None,
        }
    }
}

impl SyncConfig {
    /// Config for a table at `store_path` with embeddings of width `embedding_dim`
    pub fn new(store_path: impl Into<PathBuf>, embedding_dim: usize) -> Self {
        SyncConfig {
            store_path: store_path.into(),
            embedding_dim,
            ..Default::default()
        }
    }

    /// Set chunk size; the sub-batch size is clamped to it
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.embed_batch_size = self.embed_batch_size.min(chunk_size);
        self
    }

    /// Set featurizer sub-batch size
    pub fn with_embed_batch_size(mut self, batch_size: usize) -> Self {
        self.embed_batch_size = batch_size;
        self
    }

    /// Set append (`true`) or rebuild (`false`) mode
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Cap the number of master-list entries
    pub fn with_max_molecules(mut self, max: usize) -> Self {
        self.max_molecules = Some(max);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(invalid("store_path must not be empty"));
        }
        if self.embedding_dim == 0 {
            return Err(invalid("embedding_dim must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be positive"));
        }
        if self.embed_batch_size == 0 {
            return Err(invalid("embed_batch_size must be positive"));
        }
        if self.embed_batch_size > self.chunk_size {
            return Err(invalid(format!(
                "embed_batch_size ({}) must not exceed chunk_size ({})",
                self.embed_batch_size, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# featstore sync configuration

# Feature table file (created on first sync)
store_path = "features.fst"

# Width of every embedding. Must match the table once it exists.
embedding_dim = 5000

# Keys per chunk. Each chunk is featurized and appended as one unit, so an
# interrupted run loses at most one chunk of work.
chunk_size = 10000

# Keys per featurizer sub-batch (must be <= chunk_size)
embed_batch_size = 1000

# true  = keep the table and only add missing keys
# false = delete the table and rebuild from scratch
append = true

# Use only the first N entries of the master key list
# max_molecules = 100000000
"#
    }

    /// Read, parse and validate config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            invalid(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: SyncConfig = toml::from_str(&content).map_err(|e| {
            invalid(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| invalid(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> FeatureStoreError {
    FeatureStoreError::InvalidConfig(msg.into())
}
