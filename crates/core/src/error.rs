//! Error types for featstore
//!
//! Every fallible operation in the workspace returns [`Result`]. Errors are
//! never caught inside the sync run; they propagate to the caller, who
//! recovers by re-running sync in append mode.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for featstore operations
pub type Result<T> = std::result::Result<T, FeatureStoreError>;

/// Error types for the feature store
#[derive(Debug, Error)]
pub enum FeatureStoreError {
    /// Append attempted against a table that does not exist
    #[error("Feature table not found: {}", path.display())]
    StoreNotFound {
        /// Path that was expected to hold a table
        path: PathBuf,
    },

    /// Create attempted where preconditions are violated
    #[error("Cannot create feature table {}: {reason}", path.display())]
    StoreCreation {
        /// Target path
        path: PathBuf,
        /// Which precondition failed
        reason: String,
    },

    /// Embedding width or per-batch row counts disagree
    #[error("Shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// What was being compared (e.g. "embedding width")
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// The featurization client failed for a chunk
    #[error("Featurization failed: {0}")]
    Featurization(String),

    /// On-disk table failed validation (magic, version, checksum)
    #[error("Corrupted feature table {}: {reason}", path.display())]
    Corrupted {
        /// Table path
        path: PathBuf,
        /// What failed to validate
        reason: String,
    },

    /// Configuration is invalid
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error (file operations, subprocess pipes)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FeatureStoreError {
    /// Create a creation error
    pub fn creation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FeatureStoreError::StoreCreation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a corruption error
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FeatureStoreError::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape(what: &'static str, expected: usize, got: usize) -> Self {
        FeatureStoreError::ShapeMismatch {
            what,
            expected,
            got,
        }
    }

    /// Create a featurization error
    pub fn featurization(msg: impl Into<String>) -> Self {
        FeatureStoreError::Featurization(msg.into())
    }

    /// Check if this error indicates the table was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, FeatureStoreError::StoreNotFound { .. })
    }

    /// Check if this error is a shape mismatch
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, FeatureStoreError::ShapeMismatch { .. })
    }
}
