//! Signed transactions as a write-set producer for the bucket index.
//!
//! A [`Transaction`] has a content digest over its signed fields. A
//! [`Transactions`] list turns into a write set keyed by those digests
//! (lower-case hex) with each transaction's JSON encoding as the value, and
//! is summarized or persisted through `bmt-core`.

pub mod address;
pub mod error;
pub mod transaction;
pub mod transactions;

pub use address::{Address, ADDRESS_LEN};
pub use error::{TxError, TxResult};
pub use transaction::{Transaction, MAX_TX_SIZE};
pub use transactions::{by_nonce, by_nonce_then_price, Transactions, TxMeta};
