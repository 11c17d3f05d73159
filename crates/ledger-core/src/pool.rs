//! Pending transactions, kept in arrival order.
//!
//! Selecting transactions for a block copies them out; nothing is ever
//! removed, so a transaction can be mined into more than one block.

use serde::Serialize;
use tracing::debug;

use crate::constants::REFERENCE_TRANSACTIONS;
use crate::{LedgerError, Result, Transaction};

#[derive(Clone, Debug, Default, Serialize)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool seeded with [`REFERENCE_TRANSACTIONS`].
    pub fn reference() -> Self {
        REFERENCE_TRANSACTIONS
            .iter()
            .map(|&(sender, recipient, value)| Transaction::new(sender, recipient, value))
            .collect()
    }

    /// Builds a transaction and appends it. Duplicates are kept.
    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        value: f32,
    ) -> &Transaction {
        self.push(Transaction::new(sender, recipient, value))
    }

    pub fn push(&mut self, tx: Transaction) -> &Transaction {
        debug!(
            id = %tx.id(),
            sender = %tx.sender(),
            recipient = %tx.recipient(),
            "transaction pooled"
        );
        self.transactions.push(tx);
        &self.transactions[self.transactions.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Transaction> {
        self.transactions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Copies the transactions at the given zero-based `indices`, in that
    /// order. Repeated indices yield repeated transactions.
    pub fn select(&self, indices: &[usize]) -> Result<Vec<Transaction>> {
        indices
            .iter()
            .map(|&index| {
                self.get(index).cloned().ok_or(LedgerError::IndexOutOfRange {
                    index,
                    len: self.len(),
                })
            })
            .collect()
    }

    /// Every pending transaction, in order.
    pub fn select_all(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }
}

impl FromIterator<Transaction> for TransactionPool {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        let mut pool = Self::new();
        for tx in iter {
            pool.push(tx);
        }
        pool
    }
}

impl<'a> IntoIterator for &'a TransactionPool {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
