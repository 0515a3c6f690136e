//! One-shot root aggregation over a write set.

use std::collections::HashMap;
use std::sync::Arc;

use bmt_crypto::ContentHasher;
use bmt_store::{ObjectStore, WriteBatch};
use bmt_types::Digest;
use tracing::info;

use crate::config::BmtConfig;
use crate::db::BucketDb;
use crate::error::BmtResult;
use crate::index::BucketIndex;

/// Key → value entries to summarize. Empty values are treated as absent.
pub type WriteSet = HashMap<String, Vec<u8>>;

/// Hash the concatenation of `slot_digests` in slot order.
pub fn fold_root(slot_digests: &[Digest]) -> Digest {
    ContentHasher::ROOT.hash_parts(slot_digests.iter().map(|d| d.as_bytes().as_slice()))
}

/// Root digest of `write_set` with the default capacity. Persists nothing.
pub fn compute_root(write_set: &WriteSet) -> BmtResult<Digest> {
    compute_root_with_config(write_set, &BmtConfig::default())
}

/// Root digest of `write_set` using `config.capacity` slots.
pub fn compute_root_with_config(write_set: &WriteSet, config: &BmtConfig) -> BmtResult<Digest> {
    config.validate()?;
    let index = BucketIndex::new(config.capacity)?;
    populate(&index, write_set)?;
    Ok(index.root_digest())
}

/// Build the index for `write_set`, persist its buckets and manifest to
/// `store` in one batch, and return the root.
pub fn commit_write_set(write_set: &WriteSet, store: Arc<dyn ObjectStore>) -> BmtResult<Digest> {
    commit_write_set_with_config(write_set, store, &BmtConfig::default())
}

/// [`commit_write_set`] with an explicit capacity.
pub fn commit_write_set_with_config(
    write_set: &WriteSet,
    store: Arc<dyn ObjectStore>,
    config: &BmtConfig,
) -> BmtResult<Digest> {
    config.validate()?;
    let db = BucketDb::new(Arc::clone(&store));
    let index = BucketIndex::with_store(store, config.capacity)?;
    populate(&index, write_set)?;

    let mut batch = WriteBatch::new();
    let buckets = index.commit(&mut batch)?;
    let root = index.root_digest();
    let manifest = index.manifest();
    db.put_manifest(&mut batch, root, &manifest)?;
    db.write(batch)?;

    info!(
        root = %root.short_hex(),
        entries = write_set.len(),
        buckets,
        occupied = manifest.occupied(),
        "write set committed"
    );
    Ok(root)
}

fn populate(index: &BucketIndex, write_set: &WriteSet) -> BmtResult<()> {
    for (key, value) in write_set {
        index.put(key, value)?;
    }
    Ok(())
}
