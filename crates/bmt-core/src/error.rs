//! Error types for the BMT core.

use bmt_types::Digest;

/// Errors that can occur during bucket index operations.
#[derive(Debug, thiserror::Error)]
pub enum BmtError {
    /// The key is not present.
    #[error("key not found: {0}")]
    NotFound(String),

    /// A bucket or manifest referenced by digest is missing from the store.
    #[error("object not found in store: {0}")]
    BucketNotFound(Digest),

    /// `commit` was called on an index built without a store.
    #[error("store not configured")]
    StoreNotConfigured,

    /// Bucket, manifest or record encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] bmt_store::StoreError),

    /// The key is shorter than the 4-byte slot prefix.
    #[error("key {key:?} is {len} bytes; at least 4 are required")]
    InvalidKey { key: String, len: usize },

    /// A bucket index needs at least one slot.
    #[error("invalid capacity: {0}")]
    InvalidCapacity(usize),

    /// Content loaded by digest does not hash to that digest.
    #[error("digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: Digest, actual: Digest },

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience alias for BMT results.
pub type BmtResult<T> = Result<T, BmtError>;
