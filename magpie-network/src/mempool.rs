//! The mempool: a fixed-capacity ring of recently seen transactions.
//!
//! Strictly a cache for answering `getdata`; there is no fee ordering, no
//! conflict resolution, and no interaction with reorgs.

use std::sync::Arc;

use magpie_chain::transaction::{self, Transaction};

use crate::constants::MEMPOOL_CAPACITY;

pub struct Mempool {
    slots: Vec<Arc<Transaction>>,
    next: usize,
    capacity: usize,
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool::with_capacity(MEMPOOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Mempool {
        Mempool {
            slots: Vec::new(),
            next: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remember a transaction; once full, the oldest entry is replaced.
    pub fn push(&mut self, txn: Arc<Transaction>) {
        if self.slots.len() >= self.capacity {
            self.slots[self.next] = txn;
            self.next = (self.next + 1) % self.capacity;
        } else {
            self.slots.push(txn);
        }
    }

    /// Linear search by txid.
    pub fn get(&self, txid: &transaction::Hash) -> Option<Arc<Transaction>> {
        self.slots.iter().find(|t| t.hash() == *txid).cloned()
    }

    /// All txids, for answering `mempool`.
    pub fn txids(&self) -> Vec<transaction::Hash> {
        self.slots.iter().map(|t| t.hash()).collect()
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Mempool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_chain::transparent::{coinbase_input, Output, Script};
    use magpie_chain::Amount;

    fn txn(tag: u8) -> Arc<Transaction> {
        Arc::new(Transaction::new(
            1,
            vec![coinbase_input(vec![tag])],
            vec![Output {
                value: Amount::from_sat(tag as i64),
                pk_script: Script(vec![]),
            }],
            0,
        ))
    }

    #[test]
    fn eviction_is_first_in_first_out() {
        let mut pool = Mempool::with_capacity(3);
        let first = txn(1);
        pool.push(first.clone());
        pool.push(txn(2));
        pool.push(txn(3));
        assert!(pool.get(&first.hash()).is_some());

        // The fourth entry overwrites the first.
        pool.push(txn(4));
        assert_eq!(pool.len(), 3);
        assert!(pool.get(&first.hash()).is_none());
        assert!(pool.get(&txn(2).hash()).is_some());

        // And the fifth overwrites the second.
        pool.push(txn(5));
        assert!(pool.get(&txn(2).hash()).is_none());
        assert!(pool.get(&txn(3).hash()).is_some());
    }

    #[test]
    fn txids_lists_everything() {
        let mut pool = Mempool::with_capacity(10);
        pool.push(txn(1));
        pool.push(txn(2));
        assert_eq!(pool.txids().len(), 2);
    }
}
