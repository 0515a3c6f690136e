use bmt_types::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"bmt-bucket-v1"`) that is
/// prepended to every hash computation, so a bucket digest and a root digest
/// over identical bytes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for bucket contents (length-prefixed entries in key order).
    pub const BUCKET: Self = Self {
        domain: "bmt-bucket-v1",
    };
    /// Hasher for the root fold over per-slot bucket digests.
    pub const ROOT: Self = Self {
        domain: "bmt-root-v1",
    };
    /// Hasher for transaction content digests.
    pub const TRANSACTION: Self = Self {
        domain: "bmt-tx-v1",
    };
    /// Hasher for deriving account addresses from public keys.
    pub const ADDRESS: Self = Self {
        domain: "bmt-address-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        self.hash_parts(std::iter::once(data))
    }

    /// Hash the concatenation of `parts` without materializing it.
    ///
    /// `hash_parts([a, b])` equals `hash(a ++ b)`.
    pub fn hash_parts<'a, I>(&self, parts: I) -> Digest
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = self.begin();
        for part in parts {
            hasher.update(part);
        }
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Digest, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    fn begin(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
