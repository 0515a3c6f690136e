use bmt_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// An encoded bucket, keyed by its content digest.
    Bucket,
    /// An index manifest (capacity + per-slot digests), keyed by root digest.
    Manifest,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bucket => write!(f, "bucket"),
            Self::Manifest => write!(f, "manifest"),
        }
    }
}

/// A stored object: kind tag + serialized data + cached size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// The type of this object.
    pub kind: ObjectKind,
    /// The serialized bytes of the object.
    pub data: Vec<u8>,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl StoredObject {
    /// Create a new stored object from kind and data.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Return the data if this object has the `expected` kind.
    pub fn expect_kind(&self, id: &Digest, expected: ObjectKind) -> StoreResult<&[u8]> {
        if self.kind != expected {
            return Err(StoreError::KindMismatch {
                id: *id,
                expected: expected.to_string(),
                actual: self.kind.to_string(),
            });
        }
        Ok(&self.data)
    }
}
