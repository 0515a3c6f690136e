//! Bucket Merkle Tree (BMT).
//!
//! Summarizes an arbitrary set of key → value entries into a single root
//! digest, and persists only the parts that changed since the last commit.
//!
//! # Key Types
//!
//! - [`Bucket`] -- leaf container with a cached digest over its sorted entries
//! - [`BucketIndex`] -- fixed-capacity array of buckets with dirty tracking,
//!   lazy loading from the store, copy-on-write forks
//! - [`BucketDb`] -- bucket and manifest codec on top of an [`ObjectStore`]
//! - [`IndexManifest`] -- persisted per-slot digests of a committed index
//! - [`compute_root`] / [`commit_write_set`] -- one-shot root aggregation
//!
//! # Layout
//!
//! A key lands in slot `be_u32(key[..4]) % capacity`. Each bucket hashes its
//! length-prefixed (key, value) entries in ascending key order; the root hashes the
//! concatenation of all slot digests in slot order, with the zero digest for
//! slots that hold nothing.
//!
//! [`ObjectStore`]: bmt_store::ObjectStore

pub mod bucket;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod manifest;
pub mod root;

pub use bucket::Bucket;
pub use config::{BmtConfig, DEFAULT_CAPACITY};
pub use db::BucketDb;
pub use error::{BmtError, BmtResult};
pub use index::{bucket_index_of, BucketIndex};
pub use manifest::IndexManifest;
pub use root::{
    commit_write_set, commit_write_set_with_config, compute_root, compute_root_with_config,
    fold_root, WriteSet,
};
