use std::sync::OnceLock;

use bmt_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};
use bmt_types::Digest;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{TxError, TxResult};

/// Maximum encoded size of a transaction.
pub const MAX_TX_SIZE: usize = 32 * 1024;

/// A value transfer or contract call, optionally signed.
///
/// The content digest covers nonce, gas price, gas limit, value, sender,
/// recipient and payload only. Signature and public key are excluded so the
/// digest can be signed. Digest and encoded size are cached on first use.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transaction {
    nonce: u64,
    gas_price: u64,
    gas_limit: u64,
    #[serde(with = "amount")]
    value: u128,
    from: Address,
    to: Address,
    #[serde(with = "hex_bytes")]
    payload: Vec<u8>,
    #[serde(default, with = "hex_opt")]
    pub_key: Option<Vec<u8>>,
    #[serde(default, with = "hex_opt")]
    signature: Option<Vec<u8>>,

    #[serde(skip)]
    hash: OnceLock<Digest>,
    #[serde(skip)]
    size: OnceLock<usize>,
}

/// The signed portion of a [`Transaction`].
#[derive(Serialize)]
struct TxData<'a> {
    nonce: u64,
    gas_price: u64,
    gas_limit: u64,
    #[serde(with = "amount")]
    value: u128,
    from: &'a Address,
    to: &'a Address,
    #[serde(with = "hex_bytes")]
    payload: &'a [u8],
}

impl Transaction {
    pub fn new(
        nonce: u64,
        gas_price: u64,
        gas_limit: u64,
        value: u128,
        payload: Vec<u8>,
        from: Address,
        to: Address,
    ) -> Self {
        Self {
            nonce,
            gas_price,
            gas_limit,
            value,
            from,
            to,
            payload,
            ..Self::default()
        }
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn gas_price(&self) -> u64 {
        self.gas_price
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn value(&self) -> u128 {
        self.value
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn pub_key(&self) -> Option<&[u8]> {
        self.pub_key.as_deref()
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Returns `true` if the recipient is the zero address.
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_zero()
    }

    fn data(&self) -> TxData<'_> {
        TxData {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            value: self.value,
            from: &self.from,
            to: &self.to,
            payload: &self.payload,
        }
    }

    /// Content digest over the signed fields.
    pub fn hash(&self) -> TxResult<Digest> {
        if let Some(hash) = self.hash.get() {
            return Ok(*hash);
        }
        let hash = ContentHasher::TRANSACTION
            .hash_json(&self.data())
            .map_err(|e| TxError::Serialization(e.to_string()))?;
        Ok(*self.hash.get_or_init(|| hash))
    }

    /// Write-set key: lower-case hex of the content digest.
    pub fn key(&self) -> TxResult<String> {
        Ok(self.hash()?.to_hex())
    }

    /// Sign the content digest with `key` and attach the public key.
    ///
    /// An already signed transaction is left untouched and its existing
    /// signature is returned.
    pub fn sign(&mut self, key: &SigningKey) -> TxResult<&[u8]> {
        if self.signature.is_none() {
            let hash = self.hash()?;
            let signature = key.sign(hash.as_bytes());
            self.signature = Some(signature.to_bytes().to_vec());
            self.pub_key = Some(key.verifying_key().as_bytes().to_vec());
            self.size = OnceLock::new();
        }
        Ok(self.signature.as_deref().unwrap_or_default())
    }

    /// Check the attached signature against the attached public key, and the
    /// public key against the sender address.
    pub fn verify(&self) -> TxResult<()> {
        let signature = self.signature.as_deref().ok_or(TxError::SignatureNotFound)?;
        let pub_key = self.pub_key.as_deref().ok_or(TxError::PubkeyNotFound)?;
        let key = VerifyingKey::from_slice(pub_key)?;
        if Address::from_public_key(&key) != self.from {
            return Err(TxError::AddressMismatch);
        }
        let signature = Signature::from_slice(signature)?;
        key.verify(self.hash()?.as_bytes(), &signature)?;
        Ok(())
    }

    /// Maximum amount the sender can be charged: value plus gas limit.
    pub fn cost(&self) -> u128 {
        self.value.saturating_add(u128::from(self.gas_limit))
    }

    /// Canonical JSON encoding, used as the write-set value.
    pub fn encode(&self) -> TxResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TxError::Serialization(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> TxResult<Self> {
        serde_json::from_slice(data).map_err(|e| TxError::Serialization(e.to_string()))
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> TxResult<usize> {
        if let Some(size) = self.size.get() {
            return Ok(*size);
        }
        let size = self.encode()?.len();
        Ok(*self.size.get_or_init(|| size))
    }

    /// Reject transactions whose encoding exceeds [`MAX_TX_SIZE`].
    pub fn check_size(&self) -> TxResult<()> {
        let size = self.size()?;
        if size > MAX_TX_SIZE {
            return Err(TxError::TooLarge {
                size,
                max: MAX_TX_SIZE,
            });
        }
        Ok(())
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data()
            && self.pub_key == other.pub_key
            && self.signature == other.signature
    }
}

impl Eq for Transaction {}

impl PartialEq for TxData<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.nonce == other.nonce
            && self.gas_price == other.gas_price
            && self.gas_limit == other.gas_limit
            && self.value == other.value
            && self.from == other.from
            && self.to == other.to
            && self.payload == other.payload
    }
}

/// `u128` as a decimal string, which every JSON reader can carry.
mod amount {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(
        bytes: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SigningKey {
        SigningKey::from_bytes([7; 32])
    }

    fn unsigned(from: Address) -> Transaction {
        Transaction::new(
            3,
            10,
            21_000,
            1_000_000,
            b"hello".to_vec(),
            from,
            Address::from_bytes([2; 20]),
        )
    }

    fn signed() -> Transaction {
        let key = key();
        let mut tx = unsigned(Address::from_public_key(&key.verifying_key()));
        tx.sign(&key).unwrap();
        tx
    }

    // ---------------------------------------------------------------
    // Hashing
    // ---------------------------------------------------------------

    #[test]
    fn hash_ignores_signature() {
        let tx = unsigned(Address::from_public_key(&key().verifying_key()));
        let before = tx.hash().unwrap();
        assert_eq!(signed().hash().unwrap(), before);
    }

    #[test]
    fn hash_covers_every_signed_field() {
        let base = unsigned(Address::ZERO);
        let variants = [
            Transaction { nonce: 4, ..base.clone() },
            Transaction { gas_price: 11, ..base.clone() },
            Transaction { gas_limit: 1, ..base.clone() },
            Transaction { value: 2, ..base.clone() },
            Transaction { from: Address::from_bytes([9; 20]), ..base.clone() },
            Transaction { to: Address::ZERO, ..base.clone() },
            Transaction { payload: vec![], ..base.clone() },
        ];
        let h = base.hash().unwrap();
        for tx in &variants {
            assert_ne!(tx.hash().unwrap(), h);
        }
    }

    #[test]
    fn key_is_lower_hex_of_hash() {
        let tx = signed();
        let key = tx.key().unwrap();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(key, tx.hash().unwrap().to_hex());
    }

    // ---------------------------------------------------------------
    // Signing
    // ---------------------------------------------------------------

    #[test]
    fn sign_then_verify() {
        let tx = signed();
        assert!(tx.pub_key().is_some());
        tx.verify().unwrap();
    }

    #[test]
    fn sign_twice_keeps_first_signature() {
        let mut tx = signed();
        let first = tx.signature().unwrap().to_vec();
        let second = tx.sign(&SigningKey::from_bytes([8; 32])).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn verify_unsigned_fails() {
        let tx = unsigned(Address::ZERO);
        assert!(matches!(tx.verify(), Err(TxError::SignatureNotFound)));
    }

    #[test]
    fn verify_without_pubkey_fails() {
        let mut tx = signed();
        tx.pub_key = None;
        assert!(matches!(tx.verify(), Err(TxError::PubkeyNotFound)));
    }

    #[test]
    fn verify_wrong_sender_fails() {
        let key = key();
        let mut tx = unsigned(Address::from_bytes([1; 20]));
        tx.sign(&key).unwrap();
        assert!(matches!(tx.verify(), Err(TxError::AddressMismatch)));
    }

    #[test]
    fn verify_tampered_signature_fails() {
        let mut tx = signed();
        if let Some(sig) = tx.signature.as_mut() {
            sig[0] ^= 0xff;
        }
        assert!(matches!(tx.verify(), Err(TxError::Signature(_))));
    }

    // ---------------------------------------------------------------
    // Encoding, size, cost
    // ---------------------------------------------------------------

    #[test]
    fn encode_decode_keeps_signature() {
        let tx = signed();
        let decoded = Transaction::decode(&tx.encode().unwrap()).unwrap();
        assert_eq!(decoded, tx);
        decoded.verify().unwrap();
    }

    #[test]
    fn large_value_survives_json() {
        let tx = Transaction {
            value: u128::MAX,
            ..unsigned(Address::ZERO)
        };
        let decoded = Transaction::decode(&tx.encode().unwrap()).unwrap();
        assert_eq!(decoded.value(), u128::MAX);
    }

    #[test]
    fn size_grows_after_signing() {
        let mut tx = unsigned(Address::from_public_key(&key().verifying_key()));
        let before = tx.size().unwrap();
        tx.sign(&key()).unwrap();
        assert!(tx.size().unwrap() > before);
        assert_eq!(tx.size().unwrap(), tx.encode().unwrap().len());
    }

    #[test]
    fn oversized_payload_rejected() {
        let tx = Transaction {
            payload: vec![0; MAX_TX_SIZE],
            ..unsigned(Address::ZERO)
        };
        assert!(matches!(tx.check_size(), Err(TxError::TooLarge { .. })));
        assert!(unsigned(Address::ZERO).check_size().is_ok());
    }

    #[test]
    fn cost_is_value_plus_gas_limit() {
        assert_eq!(unsigned(Address::ZERO).cost(), 1_021_000);
        let rich = Transaction {
            value: u128::MAX,
            ..unsigned(Address::ZERO)
        };
        assert_eq!(rich.cost(), u128::MAX);
    }

    #[test]
    fn zero_recipient_is_contract_creation() {
        let tx = Transaction {
            to: Address::ZERO,
            ..unsigned(Address::ZERO)
        };
        assert!(tx.is_contract_creation());
        assert!(!unsigned(Address::ZERO).is_contract_creation());
    }
}
