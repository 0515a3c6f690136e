use bmt_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;

/// A set of staged writes applied atomically by [`ObjectStore::write_batch`].
///
/// Staging never touches the store; nothing is visible until the batch is
/// submitted.
///
/// [`ObjectStore::write_batch`]: crate::ObjectStore::write_batch
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    puts: Vec<(Digest, StoredObject)>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write of `object` under `id`.
    pub fn put(&mut self, id: Digest, object: StoredObject) {
        self.puts.push((id, object));
    }

    /// Move every write staged in `other` to the end of this batch.
    pub fn append(&mut self, other: WriteBatch) {
        self.puts.extend(other.puts);
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.puts.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
    }

    /// Digests staged so far, in staging order.
    pub fn ids(&self) -> impl Iterator<Item = &Digest> {
        self.puts.iter().map(|(id, _)| id)
    }

    /// Reject the whole batch if any entry is keyed by the zero digest.
    pub fn validate(&self) -> StoreResult<()> {
        if self.puts.iter().any(|(id, _)| id.is_zero()) {
            return Err(StoreError::NullDigest);
        }
        Ok(())
    }
}

impl IntoIterator for WriteBatch {
    type Item = (Digest, StoredObject);
    type IntoIter = std::vec::IntoIter<(Digest, StoredObject)>;

    fn into_iter(self) -> Self::IntoIter {
        self.puts.into_iter()
    }
}
