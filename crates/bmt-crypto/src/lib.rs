//! Cryptographic primitives for the Bucket Merkle Tree.
//!
//! Provides domain-separated BLAKE3 hashing for bucket, root and record
//! digests, and Ed25519 keys used to sign write-set producers.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::{ContentHasher, HasherError};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
