use std::fmt;

use bmt_crypto::{ContentHasher, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TxError;

/// Length of an account address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Account address: the first 20 bytes of the address-domain hash of an
/// Ed25519 public key.
///
/// Serialized as a lower-case hex string. The all-zero address is used as the
/// recipient of contract-creating transactions.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0u8; ADDRESS_LEN]);

    /// Derive the address owned by `key`.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = ContentHasher::ADDRESS.hash(&key.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_LEN]);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse 40 hex characters, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TxError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TxError::InvalidAddress(e.to_string()))?;
        let arr: [u8; ADDRESS_LEN] = bytes.as_slice().try_into().map_err(|_| {
            TxError::InvalidAddress(format!(
                "expected {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
