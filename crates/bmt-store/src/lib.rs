//! Digest-keyed object storage for the Bucket Merkle Tree.
//!
//! The store is the durable owner of persisted buckets. It never interprets
//! object contents: callers hand it `(digest, object)` pairs inside a
//! [`WriteBatch`] and read them back by digest.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileObjectStore`] -- append-only segment file, one CRC-framed record
//!   per batch
//!
//! # Design Rules
//!
//! 1. A batch is applied all-or-nothing.
//! 2. The zero digest is never a valid key.
//! 3. Writing the same digest twice keeps the first object (content
//!    addressing guarantees both are identical).
//! 4. All I/O errors are propagated, never silently ignored.

pub mod batch;
pub mod error;
pub mod file;
pub mod memory;
pub mod object;
pub mod traits;

pub use batch::WriteBatch;
pub use error::{StoreError, StoreResult};
pub use file::{FileObjectStore, FileStoreConfig, SyncMode};
pub use memory::InMemoryObjectStore;
pub use object::{ObjectKind, StoredObject};
pub use traits::ObjectStore;
