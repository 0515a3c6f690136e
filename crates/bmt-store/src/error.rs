use bmt_types::Digest;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be decoded.
    #[error("corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    /// A stored object does not have the expected kind.
    #[error("object {id} has kind {actual}, expected {expected}")]
    KindMismatch {
        id: Digest,
        expected: String,
        actual: String,
    },

    /// Attempted to write under the zero digest.
    #[error("cannot store object under the zero digest")]
    NullDigest,

    /// Storage backend is read-only.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
