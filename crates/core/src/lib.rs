//! Core types for featstore
//!
//! This crate defines the foundational types used throughout the workspace:
//! - MoleculeKey: opaque string identifier of one chemical structure
//! - EmbeddingMatrix: row-major f32 matrix, one embedding per row
//! - FeatureStoreError: error hierarchy shared by every crate

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{FeatureStoreError, Result};
pub use types::{EmbeddingMatrix, MoleculeKey};
