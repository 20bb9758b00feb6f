//! Column Invariant Tests
//!
//! After every create and append the two columns have the same row count,
//! row i of one belongs to row i of the other, and earlier rows never move.

use crate::common::*;
use proptest::prelude::*;

fn embed(dim: usize, keys: &[String]) -> EmbeddingMatrix {
    HashFeaturizer::new(dim).embed(keys).unwrap()
}

#[test]
fn row_counts_agree_after_each_operation() {
    let store = TestStore::new();
    let batches = [keys(&["a", "b"]), keys(&["c"]), keys(&["d", "e", "f"])];

    table::create(&store.path, &embed(3, &batches[0]), &batches[0], false).unwrap();
    assert_eq!(table::row_count(&store.path).unwrap(), Some(2));
    assert_rows_match_keys(&store, 3);

    let mut expected = 2;
    for batch in &batches[1..] {
        expected += batch.len() as u64;
        let rows = table::append(&store.path, &embed(3, batch), batch).unwrap();
        assert_eq!(rows, expected);
        assert_eq!(table::row_count(&store.path).unwrap(), Some(expected));
        assert_rows_match_keys(&store, 3);
    }

    assert_eq!(store.keys(), keys(&["a", "b", "c", "d", "e", "f"]));
}

#[test]
fn mismatched_columns_rejected_on_create() {
    let store = TestStore::new();
    let values = embed(3, &keys(&["a", "b"]));

    let err = table::create(&store.path, &values, &keys(&["a"]), false).unwrap_err();
    assert!(matches!(err, FeatureStoreError::StoreCreation { .. }));
    assert!(!table::exists(&store.path));
}

#[test]
fn mismatched_columns_rejected_on_append() {
    let store = TestStore::new();
    let initial = keys(&["a"]);
    table::create(&store.path, &embed(3, &initial), &initial, false).unwrap();
    let before = store.bytes();

    let err = table::append(&store.path, &embed(3, &keys(&["b", "c"])), &keys(&["b"])).unwrap_err();
    assert!(err.is_shape_mismatch());

    let err = table::append(&store.path, &embed(4, &keys(&["b"])), &keys(&["b"])).unwrap_err();
    assert!(err.is_shape_mismatch());

    assert_eq!(store.bytes(), before);
}

#[test]
fn append_to_missing_table_is_not_found() {
    let store = TestStore::new();
    let batch = keys(&["a"]);

    let err = table::append(&store.path, &embed(2, &batch), &batch).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn missing_table_reads_as_empty_key_list() {
    let store = TestStore::new();
    assert!(store.keys().is_empty());
    assert_eq!(table::row_count(&store.path).unwrap(), None);
    assert_eq!(table::dim(&store.path).unwrap(), None);
}

#[test]
fn create_refuses_existing_file_unless_overwriting() {
    let store = TestStore::new();
    let first = keys(&["a"]);
    let second = keys(&["x", "y"]);
    table::create(&store.path, &embed(2, &first), &first, false).unwrap();

    let err = table::create(&store.path, &embed(2, &second), &second, false).unwrap_err();
    assert!(matches!(err, FeatureStoreError::StoreCreation { .. }));
    assert_eq!(store.keys(), first);

    table::create(&store.path, &embed(2, &second), &second, true).unwrap();
    assert_eq!(store.keys(), second);
}

#[test]
fn empty_table_accepts_appends() {
    let store = TestStore::new();
    table::create(&store.path, &EmbeddingMatrix::empty(4), &[], false).unwrap();
    assert_eq!(table::row_count(&store.path).unwrap(), Some(0));
    assert_eq!(table::dim(&store.path).unwrap(), Some(4));

    let batch = keys(&["a", "b"]);
    table::append(&store.path, &embed(4, &batch), &batch).unwrap();
    assert_rows_match_keys(&store, 4);
}

#[test]
fn reopened_handle_sees_committed_rows() {
    let store = TestStore::new();
    let batch = keys(&["a", "b"]);
    let mut handle = FeatureTable::create(&store.path, &embed(2, &batch), &batch, false).unwrap();
    handle.append(&embed(2, &keys(&["c"])), &keys(&["c"])).unwrap();
    drop(handle);

    let reopened = FeatureTable::open_read(&store.path).unwrap();
    assert_eq!(reopened.rows(), 3);
    assert_eq!(reopened.dim(), 2);
    assert_eq!(reopened.read_keys().unwrap(), keys(&["a", "b", "c"]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_append_sequences_keep_columns_aligned(
        batches in prop::collection::vec(
            prop::collection::vec("[A-Za-z0-9()=#@+\\-\\[\\]]{1,12}", 0..6),
            1..8,
        ),
        dim in 1usize..6,
    ) {
        let store = TestStore::new();
        let mut expected: Vec<String> = Vec::new();

        for (i, batch) in batches.iter().enumerate() {
            let values = embed(dim, batch);
            if i == 0 {
                table::create(&store.path, &values, batch, false).unwrap();
            } else {
                table::append(&store.path, &values, batch).unwrap();
            }
            expected.extend(batch.iter().cloned());

            let (stored, inputs) = store.read_all();
            prop_assert_eq!(stored.rows(), inputs.len());
            prop_assert_eq!(&inputs, &expected);
        }

        let reference = HashFeaturizer::new(dim);
        let (stored, inputs) = store.read_all();
        for (i, key) in inputs.iter().enumerate() {
            prop_assert_eq!(stored.row(i).unwrap(), &reference.embed_one(key)[..]);
        }
    }
}
