use std::cmp::Ordering;
use std::sync::Arc;

use bmt_core::{commit_write_set_with_config, compute_root_with_config, BmtConfig, WriteSet};
use bmt_store::ObjectStore;
use bmt_types::Digest;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TxResult;
use crate::transaction::Transaction;

/// An ordered list of transactions, summarized by the bucket index.
///
/// Each transaction contributes one entry: its hex digest as the key and its
/// JSON encoding as the value. The root therefore does not depend on list
/// order, and duplicate transactions collapse into one entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transactions(Vec<Transaction>);

impl Transactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: Transaction) {
        self.0.push(tx);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.0
    }

    /// Digest-keyed write set of the encoded transactions.
    pub fn write_set(&self) -> TxResult<WriteSet> {
        self.0
            .iter()
            .map(|tx| -> TxResult<(String, Vec<u8>)> { Ok((tx.key()?, tx.encode()?)) })
            .collect()
    }

    /// Root digest over all transactions with the default capacity.
    pub fn root(&self) -> TxResult<Digest> {
        self.root_with_config(&BmtConfig::default())
    }

    pub fn root_with_config(&self, config: &BmtConfig) -> TxResult<Digest> {
        Ok(compute_root_with_config(&self.write_set()?, config)?)
    }

    /// Persist every transaction's bucket to `store` and return the root.
    pub fn commit(&self, store: Arc<dyn ObjectStore>) -> TxResult<Digest> {
        self.commit_with_config(store, &BmtConfig::default())
    }

    pub fn commit_with_config(
        &self,
        store: Arc<dyn ObjectStore>,
        config: &BmtConfig,
    ) -> TxResult<Digest> {
        let write_set = self.write_set()?;
        let root = commit_write_set_with_config(&write_set, store, config)?;
        debug!(txs = self.len(), root = %root.short_hex(), "transactions committed");
        Ok(root)
    }

    /// Sort by ascending nonce. Stable.
    pub fn sort_by_nonce(&mut self) {
        self.0.sort_by(by_nonce);
    }

    /// Sort by ascending nonce, then by descending gas price. Stable.
    pub fn sort_by_nonce_then_price(&mut self) {
        self.0.sort_by(by_nonce_then_price);
    }
}

impl From<Vec<Transaction>> for Transactions {
    fn from(txs: Vec<Transaction>) -> Self {
        Self(txs)
    }
}

impl FromIterator<Transaction> for Transactions {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Transactions {
    type Item = Transaction;
    type IntoIter = std::vec::IntoIter<Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Ascending nonce.
pub fn by_nonce(a: &Transaction, b: &Transaction) -> Ordering {
    a.nonce().cmp(&b.nonce())
}

/// Ascending nonce; among equal nonces, higher gas price first.
pub fn by_nonce_then_price(a: &Transaction, b: &Transaction) -> Ordering {
    a.nonce()
        .cmp(&b.nonce())
        .then_with(|| b.gas_price().cmp(&a.gas_price()))
}

/// Where a transaction landed: the block, its height and its position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMeta {
    pub block_hash: Digest,
    pub height: u64,
    pub tx_index: u64,
}
