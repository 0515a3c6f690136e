use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of a [`Digest`] in bytes.
pub const DIGEST_LEN: usize = 32;

/// 256-bit content digest.
///
/// Identifies buckets, roots and transactions. Identical content always
/// produces the same `Digest`, so persisted buckets are deduplicated by the
/// store. The all-zero digest is reserved for "unset": an empty bucket slot,
/// a bucket whose digest has not been computed yet, or a slot with nothing
/// persisted.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// The zero digest.
    pub const ZERO: Self = Self([0u8; DIGEST_LEN]);

    /// Wrap a pre-computed hash.
    pub const fn from_hash(hash: [u8; DIGEST_LEN]) -> Self {
        Self(hash)
    }

    /// Build a digest from a byte slice of exactly [`DIGEST_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: DIGEST_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Returns `true` if this is the zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LEN]
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string. A leading `0x` is accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; DIGEST_LEN] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_all_zeros() {
        assert!(Digest::ZERO.is_zero());
        assert!(Digest::default().is_zero());
        assert_eq!(Digest::ZERO.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn non_zero_digest() {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        assert!(!Digest::from_hash(bytes).is_zero());
    }

    #[test]
    fn hex_roundtrip() {
        let d = Digest::from_hash([0xab; 32]);
        let parsed = Digest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn hex_accepts_0x_prefix() {
        let d = Digest::from_hash([0x11; 32]);
        let parsed = Digest::from_hex(&format!("0x{}", d.to_hex())).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn hex_rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn hex_rejects_garbage() {
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(Digest::from_hash([7; 32]).short_hex().len(), 8);
    }

    #[test]
    fn display_is_full_hex() {
        let d = Digest::from_hash([0xcd; 32]);
        let display = format!("{d}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, d.to_hex());
    }

    #[test]
    fn serde_roundtrip() {
        let d = Digest::from_hash([3; 32]);
        let json = serde_json::to_string(&d).unwrap();
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn ordering_is_bytewise() {
        assert!(Digest::from_hash([0; 32]) < Digest::from_hash([1; 32]));
    }
}
