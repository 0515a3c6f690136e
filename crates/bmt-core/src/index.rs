//! The fixed-capacity bucket index.
//!
//! [`BucketIndex`] owns an array of `capacity` bucket slots behind a single
//! `RwLock`. A slot is either absent (not materialized) or holds a shared
//! handle to an immutable-by-default [`Bucket`]. Mutation goes through
//! `Arc::make_mut`, so a bucket shared with a fork is copied the first time
//! either side changes it, and only that bucket is copied.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bmt_store::{ObjectStore, WriteBatch};
use bmt_types::Digest;
use tracing::{debug, trace};

use crate::bucket::Bucket;
use crate::db::BucketDb;
use crate::error::{BmtError, BmtResult};
use crate::manifest::IndexManifest;
use crate::root::fold_root;

/// Slot for `key`: its first four bytes as a big-endian `u32`, modulo
/// `capacity`.
///
/// Only the prefix matters, so keys sharing their first four bytes always
/// share a bucket. Persisted indices depend on this exact rule.
pub fn bucket_index_of(key: &str, capacity: usize) -> BmtResult<usize> {
    if capacity == 0 {
        return Err(BmtError::InvalidCapacity(capacity));
    }
    let bytes = key.as_bytes();
    let prefix: [u8; 4] = bytes
        .get(..4)
        .and_then(|p| p.try_into().ok())
        .ok_or_else(|| BmtError::InvalidKey {
            key: key.to_owned(),
            len: bytes.len(),
        })?;
    Ok(u32::from_be_bytes(prefix) as usize % capacity)
}

/// Digest a slot contributes to the root. Emptied buckets count as absent.
fn slot_digest(bucket: &Bucket) -> Digest {
    if bucket.is_empty() {
        Digest::ZERO
    } else {
        bucket.digest()
    }
}

#[derive(Clone)]
struct Slots {
    buckets: Vec<Option<Arc<Bucket>>>,
    /// Last persisted digest per slot.
    recorded: Vec<Digest>,
    dirty: BTreeSet<usize>,
}

/// Fixed-capacity array of buckets with dirty tracking and lazy loading.
///
/// `put`/`get` load a slot's bucket from the store on first touch (using the
/// slot's recorded digest), `commit` stages only buckets changed since the
/// previous commit, and `purge` drops everything in memory so later reads
/// reload from the store.
pub struct BucketIndex {
    db: Option<BucketDb>,
    capacity: usize,
    slots: RwLock<Slots>,
}

impl std::fmt::Debug for BucketIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.read_slots();
        f.debug_struct("BucketIndex")
            .field("capacity", &self.capacity)
            .field("materialized", &slots.buckets.iter().flatten().count())
            .field("dirty", &slots.dirty.len())
            .field("has_store", &self.db.is_some())
            .finish()
    }
}

impl BucketIndex {
    /// Create a store-less index. It can compute roots but not commit.
    pub fn new(capacity: usize) -> BmtResult<Self> {
        Self::build(None, capacity, vec![Digest::ZERO; capacity])
    }

    /// Create an empty index bound to `store`.
    pub fn with_store(store: Arc<dyn ObjectStore>, capacity: usize) -> BmtResult<Self> {
        Self::build(
            Some(BucketDb::new(store)),
            capacity,
            vec![Digest::ZERO; capacity],
        )
    }

    /// Reopen a committed index from its manifest. Buckets load lazily.
    pub fn open(store: Arc<dyn ObjectStore>, manifest: IndexManifest) -> BmtResult<Self> {
        manifest.validate()?;
        Self::build(
            Some(BucketDb::new(store)),
            manifest.capacity,
            manifest.bucket_digests,
        )
    }

    /// Look up the manifest stored under `root` and reopen that index.
    pub fn open_root(store: Arc<dyn ObjectStore>, root: &Digest) -> BmtResult<Self> {
        let manifest = BucketDb::new(Arc::clone(&store)).get_manifest(root)?;
        Self::open(store, manifest)
    }

    fn build(db: Option<BucketDb>, capacity: usize, recorded: Vec<Digest>) -> BmtResult<Self> {
        if capacity == 0 {
            return Err(BmtError::InvalidCapacity(capacity));
        }
        Ok(Self {
            db,
            capacity,
            slots: RwLock::new(Slots {
                buckets: vec![None; capacity],
                recorded,
                dirty: BTreeSet::new(),
            }),
        })
    }

    /// Number of bucket slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot that `key` maps to in this index.
    pub fn bucket_index_of(&self, key: &str) -> BmtResult<usize> {
        bucket_index_of(key, self.capacity)
    }

    // ---------------------------------------------------------------
    // Reads and writes
    // ---------------------------------------------------------------

    /// Set `key` to `value`. An empty value deletes the key.
    ///
    /// Writing the value a key already has is a no-op and leaves the slot
    /// clean. Load-or-create and the mutation happen under one exclusive
    /// lock.
    pub fn put(&self, key: &str, value: &[u8]) -> BmtResult<()> {
        let index = self.bucket_index_of(key)?;
        let mut slots = self.write_slots();
        self.materialize(&mut slots, index)?;

        let changed = match &mut slots.buckets[index] {
            Some(bucket) if bucket.get(key).unwrap_or_default() == value => false,
            Some(bucket) => Arc::make_mut(bucket).put(key, value),
            empty @ None => {
                if value.is_empty() {
                    false
                } else {
                    let mut bucket = Bucket::new();
                    bucket.put(key, value);
                    *empty = Some(Arc::new(bucket));
                    true
                }
            }
        };

        if changed {
            slots.dirty.insert(index);
            trace!(index, len = value.len(), "slot mutated");
        }
        Ok(())
    }

    /// Remove `key`. Same as `put(key, &[])`.
    pub fn delete(&self, key: &str) -> BmtResult<()> {
        self.put(key, &[])
    }

    /// Value stored under `key`, or [`BmtError::NotFound`].
    ///
    /// Never creates a bucket. A slot that is neither in memory nor
    /// persisted is reported as not found without touching the store.
    pub fn get(&self, key: &str) -> BmtResult<Vec<u8>> {
        let index = self.bucket_index_of(key)?;
        let not_found = || BmtError::NotFound(key.to_owned());

        {
            let slots = self.read_slots();
            if let Some(bucket) = &slots.buckets[index] {
                return bucket.get(key).map(<[u8]>::to_vec).ok_or_else(not_found);
            }
            if slots.recorded[index].is_zero() || self.db.is_none() {
                return Err(not_found());
            }
        }

        let mut slots = self.write_slots();
        if !self.materialize(&mut slots, index)? {
            return Err(not_found());
        }
        slots.buckets[index]
            .as_ref()
            .and_then(|bucket| bucket.get(key))
            .map(<[u8]>::to_vec)
            .ok_or_else(not_found)
    }

    /// Returns `true` if `key` has a value.
    pub fn contains(&self, key: &str) -> BmtResult<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(BmtError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Stage every dirty bucket into `batch`, keyed by its fresh digest.
    /// Buckets emptied by deletes are not staged and record a zero digest.
    ///
    /// Dirty digests are recomputed here, so the caller never has to. On
    /// success the dirty set is empty and every materialized slot's
    /// recorded digest equals its bucket's digest. If encoding fails nothing
    /// is added to `batch` and the dirty set is untouched. Returns the
    /// number of buckets staged.
    pub fn commit(&self, batch: &mut WriteBatch) -> BmtResult<usize> {
        let db = self.db.as_ref().ok_or(BmtError::StoreNotConfigured)?;
        let mut guard = self.write_slots();
        let Slots {
            buckets,
            recorded,
            dirty,
        } = &mut *guard;

        let mut staged = WriteBatch::new();
        for &index in dirty.iter() {
            if let Some(bucket) = buckets[index].as_mut().filter(|b| !b.is_empty()) {
                let digest = Arc::make_mut(bucket).recompute_digest();
                db.put_bucket(&mut staged, digest, bucket)?;
            }
        }

        let count = staged.len();
        batch.append(staged);
        dirty.clear();
        for (slot, bucket) in recorded.iter_mut().zip(buckets.iter()) {
            if let Some(bucket) = bucket {
                *slot = slot_digest(bucket);
            }
        }

        debug!(staged = count, "index committed");
        Ok(count)
    }

    /// Commit into a fresh batch and submit it to the store.
    pub fn flush(&self) -> BmtResult<usize> {
        let db = self.db.as_ref().ok_or(BmtError::StoreNotConfigured)?;
        let mut batch = WriteBatch::new();
        let count = self.commit(&mut batch)?;
        db.write(batch)?;
        Ok(count)
    }

    /// Drop all in-memory buckets and the dirty set. Recorded digests stay,
    /// so committed content reloads on the next access and uncommitted
    /// changes are lost.
    pub fn purge(&self) {
        let mut slots = self.write_slots();
        slots.buckets = vec![None; self.capacity];
        slots.dirty.clear();
        debug!("index purged");
    }

    // ---------------------------------------------------------------
    // Digests
    // ---------------------------------------------------------------

    /// Current digest of every slot, in slot order.
    ///
    /// Dirty buckets are rehashed first. A materialized bucket contributes
    /// its digest, or zero once it has been emptied; an absent slot
    /// contributes its recorded digest, which is zero for slots that never
    /// held anything.
    pub fn slot_digests(&self) -> Vec<Digest> {
        let mut guard = self.write_slots();
        let Slots {
            buckets,
            recorded,
            dirty,
        } = &mut *guard;

        for &index in dirty.iter() {
            if let Some(bucket) = buckets[index].as_mut() {
                Arc::make_mut(bucket).recompute_digest();
            }
        }

        buckets
            .iter()
            .zip(recorded.iter())
            .map(|(bucket, recorded)| bucket.as_deref().map_or(*recorded, slot_digest))
            .collect()
    }

    /// Root digest over all slots (see [`fold_root`]).
    pub fn root_digest(&self) -> Digest {
        fold_root(&self.slot_digests())
    }

    /// Recorded (last committed) digests as a manifest.
    pub fn manifest(&self) -> IndexManifest {
        IndexManifest {
            capacity: self.capacity,
            bucket_digests: self.read_slots().recorded.clone(),
        }
    }

    /// Last committed digest per slot.
    pub fn recorded_digests(&self) -> Vec<Digest> {
        self.read_slots().recorded.clone()
    }

    // ---------------------------------------------------------------
    // Snapshots and introspection
    // ---------------------------------------------------------------

    /// Fork this index.
    ///
    /// The fork shares every bucket with `self` until one side mutates it;
    /// the writer then gets a private copy of that bucket alone. Dirty set
    /// and recorded digests are copied, the store is shared.
    pub fn fork(&self) -> Self {
        let slots = self.read_slots().clone();
        Self {
            db: self.db.clone(),
            capacity: self.capacity,
            slots: RwLock::new(slots),
        }
    }

    /// Number of slots changed since the last commit.
    pub fn dirty_count(&self) -> usize {
        self.read_slots().dirty.len()
    }

    /// Returns `true` if `index` changed since the last commit.
    pub fn is_dirty(&self, index: usize) -> bool {
        self.read_slots().dirty.contains(&index)
    }

    /// Dirty slot indices in ascending order.
    pub fn dirty_indices(&self) -> Vec<usize> {
        self.read_slots().dirty.iter().copied().collect()
    }

    /// Number of slots whose bucket is in memory.
    pub fn materialized_count(&self) -> usize {
        self.read_slots().buckets.iter().flatten().count()
    }

    /// Load the bucket for `index` if it is absent and persisted. Returns
    /// whether the slot now holds a bucket. On error the slot is unchanged.
    fn materialize(&self, slots: &mut Slots, index: usize) -> BmtResult<bool> {
        if slots.buckets[index].is_some() {
            return Ok(true);
        }
        let recorded = slots.recorded[index];
        let Some(db) = self.db.as_ref().filter(|_| !recorded.is_zero()) else {
            return Ok(false);
        };
        let bucket = db.get_bucket(&recorded)?;
        slots.buckets[index] = Some(Arc::new(bucket));
        debug!(index, digest = %recorded.short_hex(), "bucket materialized");
        Ok(true)
    }

    fn read_slots(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().expect("index lock poisoned")
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().expect("index lock poisoned")
    }
}
