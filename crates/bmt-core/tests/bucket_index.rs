use std::sync::Arc;

use bmt_core::bucket::encode_entry;
use bmt_core::{
    commit_write_set_with_config, compute_root_with_config, BmtConfig, BmtError, BucketIndex,
    WriteSet,
};
use bmt_crypto::ContentHasher;
use bmt_store::{FileObjectStore, FileStoreConfig, InMemoryObjectStore, ObjectStore, WriteBatch};
use bmt_types::Digest;
use proptest::prelude::*;

fn config(capacity: usize) -> BmtConfig {
    BmtConfig {
        capacity,
        ..BmtConfig::default()
    }
}

fn single_entry_digest(key: &str, value: &str) -> Digest {
    let mut preimage = Vec::new();
    encode_entry(&mut preimage, key.as_bytes(), value.as_bytes());
    ContentHasher::BUCKET.hash(&preimage)
}

fn entries(pairs: &[(&str, &str)]) -> Vec<(String, Vec<u8>)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
        .collect()
}

// ---------------------------------------------------------------
// Four keys, four slots
// ---------------------------------------------------------------

#[test]
fn four_keys_land_in_distinct_slots() {
    let index = BucketIndex::new(4).unwrap();
    let slots: Vec<_> = ["aaaa", "bbbb", "cccc", "dddd"]
        .iter()
        .map(|k| index.bucket_index_of(k).unwrap())
        .collect();
    assert_eq!(slots, vec![1, 2, 3, 0]);
}

#[test]
fn root_is_fold_of_bucket_digests_in_slot_order() {
    let index = BucketIndex::new(4).unwrap();
    for (key, value) in [("aaaa", "1"), ("bbbb", "2"), ("cccc", "3"), ("dddd", "4")] {
        index.put(key, value.as_bytes()).unwrap();
    }

    // slot 0 holds dddd, slot 1 aaaa, slot 2 bbbb, slot 3 cccc
    let expected: Vec<Digest> = [("dddd", "4"), ("aaaa", "1"), ("bbbb", "2"), ("cccc", "3")]
        .iter()
        .map(|(k, v)| single_entry_digest(k, v))
        .collect();
    assert_eq!(index.slot_digests(), expected);

    let mut concat = Vec::new();
    for digest in &expected {
        concat.extend_from_slice(digest.as_bytes());
    }
    assert_eq!(index.root_digest(), ContentHasher::ROOT.hash(&concat));
}

#[test]
fn changing_one_key_changes_one_bucket() {
    let index = BucketIndex::new(4).unwrap();
    for (key, value) in [("aaaa", "1"), ("bbbb", "2"), ("cccc", "3"), ("dddd", "4")] {
        index.put(key, value.as_bytes()).unwrap();
    }
    let before = index.slot_digests();
    let root_before = index.root_digest();

    index.put("aaaa", b"changed").unwrap();
    let after = index.slot_digests();

    let changed: Vec<_> = (0..4).filter(|&i| before[i] != after[i]).collect();
    assert_eq!(changed, vec![1]);
    assert_ne!(index.root_digest(), root_before);
}

// ---------------------------------------------------------------
// Order independence
// ---------------------------------------------------------------

#[test]
fn insertion_order_gives_identical_recorded_digests() {
    let pairs = entries(&[
        ("aaaa-1", "x"),
        ("aaaa-2", "y"),
        ("bbbb", "z"),
        ("key-9", "w"),
        ("zzzz", "v"),
    ]);

    let commit_in = |order: &[(String, Vec<u8>)]| {
        let store = Arc::new(InMemoryObjectStore::new());
        let index = BucketIndex::with_store(store.clone(), 8).unwrap();
        for (k, v) in order {
            index.put(k, v).unwrap();
        }
        index.flush().unwrap();
        index.recorded_digests()
    };

    let forward = commit_in(&pairs);
    let mut reversed = pairs.clone();
    reversed.reverse();
    assert_eq!(forward, commit_in(&reversed));
}

proptest! {
    #[test]
    fn root_is_invariant_under_permutation(
        (pairs, permuted) in prop::collection::hash_map(
            "[a-z]{4,8}",
            prop::collection::vec(any::<u8>(), 1..16),
            0..40,
        )
        .prop_flat_map(|map| {
            let pairs: Vec<(String, Vec<u8>)> = map.into_iter().collect();
            (Just(pairs.clone()), Just(pairs).prop_shuffle())
        }),
    ) {
        let forward = BucketIndex::new(16).unwrap();
        for (k, v) in &pairs {
            forward.put(k, v).unwrap();
        }
        let shuffled = BucketIndex::new(16).unwrap();
        for (k, v) in &permuted {
            shuffled.put(k, v).unwrap();
        }

        prop_assert_eq!(forward.root_digest(), shuffled.root_digest());

        let ws: WriteSet = permuted.into_iter().collect();
        prop_assert_eq!(compute_root_with_config(&ws, &config(16)).unwrap(), forward.root_digest());
    }

    #[test]
    fn put_then_get_returns_value(
        key in "[ -~]{4,12}",
        value in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let index = BucketIndex::new(32).unwrap();
        index.put(&key, &value).unwrap();
        prop_assert_eq!(index.get(&key).unwrap(), value);
    }
}

// ---------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------

#[test]
fn second_commit_stages_nothing() {
    let store = Arc::new(InMemoryObjectStore::new());
    let index = BucketIndex::with_store(store, 4).unwrap();
    index.put("aaaa", b"1").unwrap();
    index.put("bbbb", b"2").unwrap();

    let mut first = WriteBatch::new();
    assert_eq!(index.commit(&mut first).unwrap(), 2);
    let mut second = WriteBatch::new();
    assert_eq!(index.commit(&mut second).unwrap(), 0);
    assert!(second.is_empty());
}

#[test]
fn committed_write_set_reopens_from_root() {
    let mut ws = WriteSet::new();
    ws.insert("acct-alice".into(), b"100".to_vec());
    ws.insert("acct-bob".into(), b"250".to_vec());
    ws.insert("zzzz-last".into(), b"1".to_vec());

    let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let root = commit_write_set_with_config(&ws, Arc::clone(&store), &config(8)).unwrap();

    let index = BucketIndex::open_root(store, &root).unwrap();
    assert_eq!(index.root_digest(), root);
    assert_eq!(index.get("acct-bob").unwrap(), b"250");
    assert!(matches!(index.get("acct-carol"), Err(BmtError::NotFound(_))));
}

#[test]
fn equal_values_in_different_slots_reopen_from_root() {
    let mut ws = WriteSet::new();
    ws.insert("acct-alice".into(), b"100".to_vec());
    ws.insert("zzzz-bob".into(), b"100".to_vec());

    let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let root = commit_write_set_with_config(&ws, Arc::clone(&store), &config(8)).unwrap();

    let index = BucketIndex::open_root(store, &root).unwrap();
    assert_ne!(
        index.bucket_index_of("acct-alice").unwrap(),
        index.bucket_index_of("zzzz-bob").unwrap()
    );
    assert_eq!(index.get("acct-alice").unwrap(), b"100");
    assert_eq!(index.get("zzzz-bob").unwrap(), b"100");
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bmt.seg");

    let root = {
        let store = Arc::new(FileObjectStore::open(&path, FileStoreConfig::default()).unwrap());
        let mut ws = WriteSet::new();
        ws.insert("key-1".into(), b"one".to_vec());
        ws.insert("yek-2".into(), b"two".to_vec());
        commit_write_set_with_config(&ws, store, &config(4)).unwrap()
    };

    let store = Arc::new(FileObjectStore::open(&path, FileStoreConfig::default()).unwrap());
    let index = BucketIndex::open_root(store.clone(), &root).unwrap();
    assert_eq!(index.get("key-1").unwrap(), b"one");
    assert_eq!(index.get("yek-2").unwrap(), b"two");

    // extend the reopened index and commit again
    index.put("key-3", b"three").unwrap();
    assert_eq!(index.flush().unwrap(), 1);
    index.purge();
    assert_eq!(index.get("key-3").unwrap(), b"three");
    assert_eq!(index.get("key-1").unwrap(), b"one");
}

#[test]
fn forks_commit_independently() {
    let store = Arc::new(InMemoryObjectStore::new());
    let base = BucketIndex::with_store(store.clone(), 4).unwrap();
    base.put("aaaa", b"base").unwrap();
    base.flush().unwrap();

    let fork = base.fork();
    fork.put("aaaa", b"fork").unwrap();
    assert_eq!(fork.flush().unwrap(), 1);
    assert_eq!(base.dirty_count(), 0);

    base.purge();
    fork.purge();
    assert_eq!(base.get("aaaa").unwrap(), b"base");
    assert_eq!(fork.get("aaaa").unwrap(), b"fork");
    assert_ne!(base.root_digest(), fork.root_digest());
}
