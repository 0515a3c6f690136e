//! Foundation types for the Bucket Merkle Tree (BMT).
//!
//! Every other BMT crate depends on `bmt-types`.
//!
//! # Key Types
//!
//! - [`Digest`] -- 256-bit content digest; the all-zero value means "unset"
//! - [`TypeError`] -- parse failures for digests

pub mod digest;
pub mod error;

pub use digest::{Digest, DIGEST_LEN};
pub use error::TypeError;
