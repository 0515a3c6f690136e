use bmt_types::Digest;

use crate::batch::WriteBatch;
use crate::error::StoreResult;
use crate::object::StoredObject;

/// Digest-keyed object store with atomic batches.
///
/// All implementations must satisfy these invariants:
/// - `write_batch` applies every staged write or none of them.
/// - Objects are immutable once written; a second write under an existing
///   digest is a no-op.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by digest.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    fn read(&self, id: &Digest) -> StoreResult<Option<StoredObject>>;

    /// Apply all writes in `batch` atomically.
    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()>;
}
