//! Master key source.
//!
//! The master list is a headerless CSV file with one molecule key per
//! record. Records may carry extra columns; only the first field is the key,
//! taken verbatim (quoting is undone, whitespace is kept). The whole list is
//! read into memory.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use featstore_core::Result;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use tracing::info;

/// Pre-processing pass applied to the master list before diffing.
pub trait KeyFilter {
    /// Return the subset (possibly rewritten) of `keys` that should become candidates
    fn filter(&self, keys: Vec<String>) -> Vec<String>;
}

/// Filter built from a standardize-or-reject function.
///
/// Each key is passed through `standardize`; `None` drops it, `Some(s)`
/// replaces it with `s`. The output is deduplicated, keeping the first
/// occurrence of each standardized key.
pub struct StandardizeFilter<F> {
    standardize: F,
}

impl<F> StandardizeFilter<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Wrap a standardization function
    pub fn new(standardize: F) -> Self {
        StandardizeFilter { standardize }
    }
}

impl<F> KeyFilter for StandardizeFilter<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn filter(&self, keys: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::with_capacity(keys.len());
        keys.iter()
            .filter_map(|k| (self.standardize)(k))
            .filter(|k| seen.insert(k.clone()))
            .collect()
    }
}

/// Read the master key list, honouring an optional cap on the number of entries.
///
/// Blank lines and records with an empty first field are skipped and do not
/// count towards the cap.
pub fn read_master_keys(path: impl AsRef<Path>, max_molecules: Option<usize>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let cap = max_molecules.unwrap_or(usize::MAX);

    let mut keys = Vec::new();
    let mut record = StringRecord::new();
    while keys.len() < cap && reader.read_record(&mut record).map_err(csv_error)? {
        if let Some(key) = record.get(0).filter(|k| !k.is_empty()) {
            keys.push(key.to_string());
        }
    }

    info!(
        target: "featstore::source",
        path = %path.display(),
        keys = keys.len(),
        "Read master key list"
    );
    Ok(keys)
}

/// Read the master list and run it through `filter`, if given.
///
/// The cap applies before filtering.
pub fn load_candidates(
    path: impl AsRef<Path>,
    max_molecules: Option<usize>,
    filter: Option<&dyn KeyFilter>,
) -> Result<Vec<String>> {
    let keys = read_master_keys(path, max_molecules)?;
    Ok(match filter {
        Some(filter) => {
            let before = keys.len();
            let kept = filter.filter(keys);
            info!(
                target: "featstore::source",
                before = before,
                after = kept.len(),
                "Filtered candidate keys"
            );
            kept
        }
        None => keys,
    })
}

/// Write keys as a one-column CSV, e.g. to save a filtered candidate list.
///
/// Keys containing commas, quotes or line breaks are quoted, so the file
/// reads back through [`read_master_keys`] unchanged.
pub fn write_keys(path: impl AsRef<Path>, keys: &[String]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    for key in keys {
        writer.write_record([key]).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(err: csv::Error) -> io::Error {
    io::Error::from(err)
}
