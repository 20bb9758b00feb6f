//! Resumability Tests
//!
//! A run that fails part way leaves every committed chunk in place, and a
//! second run in append mode finishes the job without redoing any key.

use crate::common::*;
use featstore::sync;

#[test]
fn interrupted_run_resumes_from_last_chunk() {
    let store = TestStore::new();
    let master = keys(&["a", "b", "c", "d"]);

    // Second featurizer call fails: only the first chunk commits
    let err = sync(&master, &store.path, 2, true, FailingFeaturizer::new(4, 1)).unwrap_err();
    assert!(matches!(err, FeatureStoreError::Featurization(_)));
    assert_eq!(store.keys(), keys(&["a", "b"]));

    let recorder = RecordingFeaturizer::new(4);
    let report = sync(&master, &store.path, 2, true, &recorder).unwrap();

    assert_eq!(recorder.embedded_keys(), keys(&["c", "d"]));
    assert_eq!(report.already_present, 2);
    assert_eq!(report.todo, 2);
    assert!(!report.created);
    assert_eq!(store.keys(), master);
    assert_rows_match_keys(&store, 4);
}

#[test]
fn failure_on_first_chunk_leaves_no_table() {
    let store = TestStore::new();

    let result = sync(&keys(&["a", "b"]), &store.path, 1, true, FailingFeaturizer::new(4, 0));
    assert!(result.is_err());
    assert!(!table::exists(&store.path));
}

#[test]
fn repeated_interruptions_converge() {
    let store = TestStore::new();
    let master = numbered_keys(10);

    // Each attempt commits one more chunk of 2 before failing
    for attempt in 1..5 {
        let result = sync(&master, &store.path, 2, true, FailingFeaturizer::new(4, 1));
        assert!(result.is_err());
        assert_eq!(store.keys(), master[..attempt * 2].to_vec());
    }

    let report = sync(&master, &store.path, 2, true, HashFeaturizer::new(4)).unwrap();
    assert_eq!(report.rows_written, 2);
    assert_eq!(store.keys(), master);
    assert_rows_match_keys(&store, 4);
}

#[test]
fn torn_append_is_discarded_before_resume() {
    let store = TestStore::new();
    let master = keys(&["a", "b", "c", "d"]);
    sync(&master[..2], &store.path, 2, true, HashFeaturizer::new(4)).unwrap();

    // Bytes from an append that never committed
    append_garbage(&store.path, &[0xAB; 57]);
    assert_eq!(store.keys(), keys(&["a", "b"]));

    sync(&master, &store.path, 2, true, HashFeaturizer::new(4)).unwrap();
    assert_eq!(store.keys(), master);
    assert_rows_match_keys(&store, 4);
}

#[test]
fn final_state_matches_uninterrupted_run() {
    let interrupted = TestStore::new();
    let clean = TestStore::new();
    let master = numbered_keys(9);

    let _ = sync(&master, &interrupted.path, 4, true, FailingFeaturizer::new(3, 2));
    sync(&master, &interrupted.path, 4, true, HashFeaturizer::new(3)).unwrap();
    sync(&master, &clean.path, 4, true, HashFeaturizer::new(3)).unwrap();

    assert_eq!(interrupted.read_all(), clean.read_all());
}
