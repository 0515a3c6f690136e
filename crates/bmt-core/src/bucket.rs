//! Leaf container of the bucket index.

use std::collections::{HashMap, HashSet};

use bmt_crypto::ContentHasher;
use bmt_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{BmtError, BmtResult};

/// A subset of the index's entries plus a cached digest over them.
///
/// The digest hashes every entry in ascending key order as
/// `len(key) ++ key ++ len(value) ++ value`, lengths as little-endian `u64`.
/// It depends only on the (key, value) set and never on insertion order, and
/// two buckets with different entries never share a digest preimage.
/// It is cached: [`digest`](Self::digest) returns the last computed value and
/// is the zero digest until the first recomputation.
///
/// Buckets carry no lock. All mutation goes through the owning
/// [`BucketIndex`](crate::BucketIndex), which holds its own lock while it
/// touches a bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    digest: Digest,
    slots: HashMap<String, Vec<u8>>,
    /// Exactly the keys of `slots`; sorted lazily before hashing.
    keys: Vec<String>,
}

impl Bucket {
    /// Create an empty bucket with a zero digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached digest. Does not recompute.
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.slots.get(key).map(Vec::as_slice)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the bucket holds no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        let mut entries: Vec<_> = self
            .slots
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    /// Sort the key list if needed, hash the entries in key order, and cache
    /// the result.
    pub(crate) fn recompute_digest(&mut self) -> Digest {
        if !self.keys.windows(2).all(|w| w[0] <= w[1]) {
            self.keys.sort_unstable();
        }
        let mut preimage = Vec::new();
        for key in &self.keys {
            if let Some(value) = self.slots.get(key) {
                encode_entry(&mut preimage, key.as_bytes(), value);
            }
        }
        self.digest = ContentHasher::BUCKET.hash(&preimage);
        self.digest
    }

    /// Apply `key = value`; an empty value deletes. Returns whether anything
    /// changed.
    pub(crate) fn put(&mut self, key: &str, value: &[u8]) -> bool {
        if self.get(key).unwrap_or_default() == value {
            return false;
        }
        if value.is_empty() {
            self.remove_key(key);
            self.slots.remove(key);
        } else {
            self.add_key(key);
            self.slots.insert(key.to_owned(), value.to_vec());
        }
        true
    }

    /// Track `key` in the key list. Duplicate adds are ignored.
    pub(crate) fn add_key(&mut self, key: &str) {
        if !self.keys.iter().any(|k| k == key) {
            self.keys.push(key.to_owned());
        }
    }

    /// Stop tracking `key`.
    pub(crate) fn remove_key(&mut self, key: &str) {
        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(pos);
        }
    }

    /// Lossless binary encoding (digest, slots and key list).
    pub fn encode(&self) -> BmtResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BmtError::Serialization(e.to_string()))
    }

    /// Decode and check that the key list matches the slots exactly.
    pub fn decode(data: &[u8]) -> BmtResult<Self> {
        let bucket: Self =
            bincode::deserialize(data).map_err(|e| BmtError::Serialization(e.to_string()))?;
        let unique: HashSet<&String> = bucket.keys.iter().collect();
        if unique.len() != bucket.keys.len()
            || bucket.keys.len() != bucket.slots.len()
            || !bucket.keys.iter().all(|k| bucket.slots.contains_key(k))
        {
            return Err(BmtError::Serialization(
                "bucket key list does not match its slots".into(),
            ));
        }
        Ok(bucket)
    }
}

/// Append one length-prefixed entry to a digest preimage.
pub fn encode_entry(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(&(key.len() as u64).to_le_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(&(value.len() as u64).to_le_bytes());
    out.extend_from_slice(value);
}
