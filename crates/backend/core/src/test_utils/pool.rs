//! In-memory transaction pool.

use crate::{LazyTransaction, TransactionPool};
use alloy_consensus::{Transaction, TxEnvelope};
use alloy_primitives::{Address, B256};
use eth_backend_types::{
    AccountPoolContent, NewTransactionsEvent, PendingFilter, PoolContent, PoolError, PoolStats,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};
use tokio::sync::broadcast;

#[derive(Debug, Default)]
struct PoolData {
    pending: BTreeMap<Address, Vec<TxEnvelope>>,
    queued: BTreeMap<Address, Vec<TxEnvelope>>,
    reject_next: Option<PoolError>,
}

impl PoolData {
    fn find(&self, hash: B256) -> Option<&TxEnvelope> {
        self.pending
            .values()
            .chain(self.queued.values())
            .flatten()
            .find(|tx| *tx.tx_hash() == hash)
    }
}

type SharedPoolData = Arc<RwLock<PoolData>>;

/// A pool transaction that is looked up again when resolved.
#[derive(Debug, Clone)]
pub struct TestLazyTransaction {
    hash: B256,
    pool: SharedPoolData,
}

impl LazyTransaction for TestLazyTransaction {
    fn hash(&self) -> B256 {
        self.hash
    }

    fn resolve(&self) -> Option<TxEnvelope> {
        self.pool.read().unwrap_or_else(PoisonError::into_inner).find(self.hash).cloned()
    }
}

/// An in-memory transaction pool.
///
/// Submitted transactions are admitted as pending under [`TestPool::default_sender`].
#[derive(Debug)]
pub struct TestPool {
    data: SharedPoolData,
    default_sender: Address,
    events: broadcast::Sender<NewTransactionsEvent>,
}

impl Default for TestPool {
    fn default() -> Self {
        Self {
            data: SharedPoolData::default(),
            default_sender: Address::repeat_byte(0x11),
            events: broadcast::channel(64).0,
        }
    }
}

impl TestPool {
    /// Returns the sender submitted transactions are filed under.
    pub const fn default_sender(&self) -> Address {
        self.default_sender
    }

    /// Makes the next submission fail with `error`.
    pub fn reject_next(&self, error: PoolError) {
        self.data.write().unwrap_or_else(PoisonError::into_inner).reject_next = Some(error);
    }

    /// Adds a non-executable transaction.
    pub fn insert_queued(&self, sender: Address, tx: TxEnvelope) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .queued
            .entry(sender)
            .or_default()
            .push(tx);
    }

    /// Removes a transaction, as after inclusion or eviction. Returns `true` if it was pooled.
    pub fn remove(&self, hash: B256) -> bool {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let data = &mut *guard;
        let mut removed = false;
        for txs in data.pending.values_mut().chain(data.queued.values_mut()) {
            let before = txs.len();
            txs.retain(|tx| *tx.tx_hash() != hash);
            removed |= txs.len() != before;
        }
        data.pending.retain(|_, txs| !txs.is_empty());
        data.queued.retain(|_, txs| !txs.is_empty());
        removed
    }
}

impl TransactionPool for TestPool {
    type Transaction = TestLazyTransaction;

    fn add_transaction(&self, tx: TxEnvelope) -> Result<(), PoolError> {
        {
            let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(err) = data.reject_next.take() {
                return Err(err);
            }
            if data.find(*tx.tx_hash()).is_some() {
                return Err(PoolError::AlreadyKnown(*tx.tx_hash()));
            }
            data.pending.entry(self.default_sender).or_default().push(tx.clone());
        }
        let _ = self.events.send(NewTransactionsEvent { transactions: vec![tx] });
        Ok(())
    }

    fn get(&self, hash: B256) -> Option<TxEnvelope> {
        self.data.read().unwrap_or_else(PoisonError::into_inner).find(hash).cloned()
    }

    fn nonce(&self, address: Address) -> u64 {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.pending
            .get(&address)
            .and_then(|txs| txs.iter().map(|tx| tx.nonce()).max())
            .map_or(0, |nonce| nonce + 1)
    }

    fn stats(&self) -> PoolStats {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        PoolStats {
            pending: data.pending.values().map(Vec::len).sum(),
            queued: data.queued.values().map(Vec::len).sum(),
        }
    }

    fn content(&self) -> PoolContent {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        PoolContent { pending: data.pending.clone(), queued: data.queued.clone() }
    }

    fn content_from(&self, address: Address) -> AccountPoolContent {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        AccountPoolContent {
            pending: data.pending.get(&address).cloned().unwrap_or_default(),
            queued: data.queued.get(&address).cloned().unwrap_or_default(),
        }
    }

    fn pending(&self, _filter: PendingFilter) -> BTreeMap<Address, Vec<TestLazyTransaction>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.pending
            .iter()
            .map(|(sender, txs)| {
                let lazy = txs
                    .iter()
                    .map(|tx| TestLazyTransaction {
                        hash: *tx.tx_hash(),
                        pool: Arc::clone(&self.data),
                    })
                    .collect();
                (*sender, lazy)
            })
            .collect()
    }

    fn subscribe_transactions(
        &self,
        _include_reorgs: bool,
    ) -> broadcast::Receiver<NewTransactionsEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_transaction;

    #[test]
    fn test_lazy_transaction_resolves_against_live_pool() {
        let pool = TestPool::default();
        let tx = test_transaction(0);
        pool.add_transaction(tx.clone()).unwrap();

        let lazy = pool.pending(PendingFilter::default()).remove(&pool.default_sender()).unwrap();
        assert_eq!(lazy[0].resolve(), Some(tx.clone()));

        assert!(pool.remove(*tx.tx_hash()));
        assert_eq!(lazy[0].resolve(), None);
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn test_queued_transactions_are_not_pending() {
        let pool = TestPool::default();
        let sender = Address::repeat_byte(0x33);
        pool.insert_queued(sender, test_transaction(4));

        assert_eq!(pool.stats(), PoolStats { pending: 0, queued: 1 });
        assert!(pool.pending(PendingFilter::default()).is_empty());
        assert_eq!(pool.nonce(sender), 0);
    }
}
