//! Bucket and manifest persistence on top of an [`ObjectStore`].

use std::sync::Arc;

use bmt_store::{ObjectKind, ObjectStore, StoredObject, WriteBatch};
use bmt_types::Digest;
use tracing::debug;

use crate::bucket::Bucket;
use crate::error::{BmtError, BmtResult};
use crate::manifest::IndexManifest;

/// Typed access to buckets and manifests in a digest-keyed store.
///
/// Writes are only ever staged into a [`WriteBatch`]; the caller submits the
/// batch with [`write`](Self::write) so that one commit lands atomically.
#[derive(Clone)]
pub struct BucketDb {
    store: Arc<dyn ObjectStore>,
}

impl BucketDb {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Load the bucket persisted under `digest`.
    ///
    /// The bucket's content is rehashed and must match `digest`.
    pub fn get_bucket(&self, digest: &Digest) -> BmtResult<Bucket> {
        let object = self
            .store
            .read(digest)?
            .ok_or(BmtError::BucketNotFound(*digest))?;
        let mut bucket = Bucket::decode(object.expect_kind(digest, ObjectKind::Bucket)?)?;
        let actual = bucket.recompute_digest();
        if actual != *digest {
            return Err(BmtError::DigestMismatch {
                expected: *digest,
                actual,
            });
        }
        debug!(digest = %digest.short_hex(), entries = bucket.len(), "loaded bucket");
        Ok(bucket)
    }

    /// Stage `bucket` under `digest`.
    pub fn put_bucket(&self, batch: &mut WriteBatch, digest: Digest, bucket: &Bucket) -> BmtResult<()> {
        batch.put(digest, StoredObject::new(ObjectKind::Bucket, bucket.encode()?));
        Ok(())
    }

    /// Load the manifest stored under `root` and check that it folds to it.
    pub fn get_manifest(&self, root: &Digest) -> BmtResult<IndexManifest> {
        let object = self
            .store
            .read(root)?
            .ok_or(BmtError::BucketNotFound(*root))?;
        let manifest = IndexManifest::decode(object.expect_kind(root, ObjectKind::Manifest)?)?;
        let actual = manifest.root();
        if actual != *root {
            return Err(BmtError::DigestMismatch {
                expected: *root,
                actual,
            });
        }
        Ok(manifest)
    }

    /// Stage `manifest` under `root`.
    pub fn put_manifest(
        &self,
        batch: &mut WriteBatch,
        root: Digest,
        manifest: &IndexManifest,
    ) -> BmtResult<()> {
        batch.put(root, StoredObject::new(ObjectKind::Manifest, manifest.encode()?));
        Ok(())
    }

    /// Submit a batch to the store atomically.
    pub fn write(&self, batch: WriteBatch) -> BmtResult<()> {
        let count = batch.len();
        self.store.write_batch(batch)?;
        debug!(count, "batch submitted");
        Ok(())
    }
}

impl std::fmt::Debug for BucketDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmt_store::InMemoryObjectStore;

    fn db() -> BucketDb {
        BucketDb::new(Arc::new(InMemoryObjectStore::new()))
    }

    fn sample_bucket() -> (Digest, Bucket) {
        let mut bucket = Bucket::new();
        bucket.put("key1", b"one");
        bucket.put("key2", b"two");
        (bucket.recompute_digest(), bucket)
    }

    #[test]
    fn put_then_get_bucket() {
        let db = db();
        let (digest, bucket) = sample_bucket();
        let mut batch = WriteBatch::new();
        db.put_bucket(&mut batch, digest, &bucket).unwrap();
        assert!(db.get_bucket(&digest).is_err(), "staged writes are invisible");

        db.write(batch).unwrap();
        assert_eq!(db.get_bucket(&digest).unwrap(), bucket);
    }

    #[test]
    fn missing_bucket() {
        let err = db().get_bucket(&Digest::from_hash([4; 32])).unwrap_err();
        assert!(matches!(err, BmtError::BucketNotFound(_)));
    }

    #[test]
    fn bucket_under_wrong_digest_is_rejected() {
        let db = db();
        let (_, bucket) = sample_bucket();
        let wrong = Digest::from_hash([8; 32]);
        let mut batch = WriteBatch::new();
        db.put_bucket(&mut batch, wrong, &bucket).unwrap();
        db.write(batch).unwrap();

        let err = db.get_bucket(&wrong).unwrap_err();
        assert!(matches!(err, BmtError::DigestMismatch { .. }));
    }

    #[test]
    fn manifest_is_not_a_bucket() {
        let db = db();
        let manifest = IndexManifest::new(1, vec![Digest::from_hash([2; 32])]).unwrap();
        let root = manifest.root();
        let mut batch = WriteBatch::new();
        db.put_manifest(&mut batch, root, &manifest).unwrap();
        db.write(batch).unwrap();

        assert_eq!(db.get_manifest(&root).unwrap(), manifest);
        assert!(matches!(
            db.get_bucket(&root),
            Err(BmtError::Store(bmt_store::StoreError::KindMismatch { .. }))
        ));
    }

    #[test]
    fn manifest_under_wrong_root_is_rejected() {
        let db = db();
        let manifest = IndexManifest::new(1, vec![Digest::from_hash([2; 32])]).unwrap();
        let wrong = Digest::from_hash([3; 32]);
        let mut batch = WriteBatch::new();
        db.put_manifest(&mut batch, wrong, &manifest).unwrap();
        db.write(batch).unwrap();

        assert!(matches!(
            db.get_manifest(&wrong),
            Err(BmtError::DigestMismatch { .. })
        ));
    }
}
