use bmt_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{BmtError, BmtResult};
use crate::root::fold_root;

/// Persisted shape of a committed [`BucketIndex`](crate::BucketIndex):
/// its capacity and the recorded digest of every slot.
///
/// Stored under the root digest it folds to, so a long-lived index can be
/// reopened from nothing but a root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Number of bucket slots.
    pub capacity: usize,
    /// Recorded digest per slot; zero for slots with nothing persisted.
    pub bucket_digests: Vec<Digest>,
}

impl IndexManifest {
    /// Build a manifest, checking that one digest exists per slot.
    pub fn new(capacity: usize, bucket_digests: Vec<Digest>) -> BmtResult<Self> {
        let manifest = Self {
            capacity,
            bucket_digests,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// The root digest these slot digests fold to.
    pub fn root(&self) -> Digest {
        fold_root(&self.bucket_digests)
    }

    /// Number of slots with persisted content.
    pub fn occupied(&self) -> usize {
        self.bucket_digests.iter().filter(|d| !d.is_zero()).count()
    }

    pub fn validate(&self) -> BmtResult<()> {
        if self.capacity == 0 {
            return Err(BmtError::InvalidCapacity(0));
        }
        if self.bucket_digests.len() != self.capacity {
            return Err(BmtError::Serialization(format!(
                "manifest has {} digests for capacity {}",
                self.bucket_digests.len(),
                self.capacity
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> BmtResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| BmtError::Serialization(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> BmtResult<Self> {
        let manifest: Self =
            serde_json::from_slice(data).map_err(|e| BmtError::Serialization(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }
}
