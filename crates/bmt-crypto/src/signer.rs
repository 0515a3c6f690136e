/// Length of an encoded Ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Length of an encoded Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 signing key (private).
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Ed25519 signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// The corresponding public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Sign a message (for records, the message is the content digest).
    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message))
    }

    /// Raw secret key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl VerifyingKey {
    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }

    /// Decode a public key carried as an untyped byte field.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| SignatureError::InvalidKey)?;
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self(key))
    }
}

impl Signature {
    /// Raw signature bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }

    /// Decode a signature carried as an untyped byte field.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidSignature)?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.0.to_bytes()))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.0.to_bytes()[..8]))
    }
}

/// Errors from signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"digest bytes");
        assert!(sk.verifying_key().verify(b"digest bytes", &sig).is_ok());
    }

    #[test]
    fn verify_fails_on_wrong_message() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"correct");
        assert_eq!(
            sk.verifying_key().verify(b"wrong", &sig),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let sk1 = SigningKey::generate();
        let sk2 = SigningKey::generate();
        let sig = sk1.sign(b"message");
        assert!(sk2.verifying_key().verify(b"message", &sig).is_err());
    }

    #[test]
    fn signature_bytes_roundtrip() {
        let sk = SigningKey::from_bytes([9; 32]);
        let sig = sk.sign(b"payload");
        let decoded = Signature::from_slice(&sig.to_bytes()).unwrap();
        assert_eq!(sig, decoded);
    }

    #[test]
    fn signature_from_short_slice_fails() {
        assert_eq!(
            Signature::from_slice(&[0u8; 10]),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn verifying_key_bytes_roundtrip() {
        let vk = SigningKey::from_bytes([5; 32]).verifying_key();
        let decoded = VerifyingKey::from_slice(&vk.as_bytes()).unwrap();
        assert_eq!(vk, decoded);
    }

    #[test]
    fn verifying_key_wrong_length() {
        assert_eq!(
            VerifyingKey::from_slice(&[1, 2, 3]),
            Err(SignatureError::InvalidKey)
        );
    }

    #[test]
    fn same_secret_same_public_key() {
        let a = SigningKey::from_bytes([1; 32]);
        let b = SigningKey::from_bytes(*a.as_bytes());
        assert_eq!(a.verifying_key(), b.verifying_key());
    }

    #[test]
    fn debug_redacts_signing_key() {
        let debug = format!("{:?}", SigningKey::generate());
        assert!(debug.contains("redacted"));
    }
}
