//! Transaction submission, lookup and pool access.

use crate::{
    BackendError, BackendResult, BackendTypes, BlockReader, EthBackend, LazyTransaction, Metrics,
    TransactionPool,
};
use alloy_consensus::TxEnvelope;
use alloy_primitives::{Address, B256};
use eth_backend_types::{
    AccountPoolContent, MinedTransaction, NewTransactionsEvent, PendingFilter, PoolContent,
    PoolStats, TransactionLookup,
};
use tokio::sync::broadcast;

impl<N: BackendTypes> EthBackend<N> {
    /// Submits a transaction to the pool.
    ///
    /// The transaction is handed to the local tracker first, if one is configured, so it is
    /// remembered for resubmission even if the pool rejects it now.
    pub fn send_transaction(&self, tx: TxEnvelope) -> BackendResult<()> {
        if let Some(tracker) = self.local_tracker() {
            tracker.track(&tx);
        }

        let hash = *tx.tx_hash();
        let result = self.pool().add_transaction(tx);
        Metrics::record_submission(&result);
        result.map_err(|err| {
            debug!(target: "eth_backend", %hash, %err, "Transaction rejected by pool");
            BackendError::from(err)
        })
    }

    /// Returns every executable pool transaction that can still be loaded.
    ///
    /// Transactions evicted while the snapshot is being loaded are skipped.
    pub fn pool_transactions(&self) -> Vec<TxEnvelope> {
        self.pool()
            .pending(PendingFilter::default())
            .into_values()
            .flatten()
            .filter_map(|lazy| {
                let tx = lazy.resolve();
                if tx.is_none() {
                    trace!(
                        target: "eth_backend",
                        hash = %lazy.hash(),
                        "Pool transaction evicted during snapshot"
                    );
                }
                tx
            })
            .collect()
    }

    /// Returns a pooled transaction by hash.
    pub fn pool_transaction(&self, hash: B256) -> Option<TxEnvelope> {
        self.pool().get(hash)
    }

    /// Returns the next nonce of `address`, accounting for pooled transactions.
    pub fn pool_nonce(&self, address: Address) -> u64 {
        self.pool().nonce(address)
    }

    /// Returns the number of pending and queued pool transactions.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool().stats()
    }

    /// Returns every pooled transaction grouped by sender.
    pub fn pool_content(&self) -> PoolContent {
        self.pool().content()
    }

    /// Returns the pooled transactions of `address`.
    pub fn pool_content_from(&self, address: Address) -> AccountPoolContent {
        self.pool().content_from(address)
    }

    /// Subscribes to transactions admitted to the pool, including ones re-injected by reorgs.
    pub fn subscribe_new_transactions(&self) -> broadcast::Receiver<NewTransactionsEvent> {
        self.pool().subscribe_transactions(true)
    }

    /// Looks a mined transaction up.
    ///
    /// Fails with [`BackendError::IndexingIncomplete`] if the transaction is not indexed yet but
    /// may be once background indexing finishes. `Ok(None)` means the transaction is not part of
    /// the chain.
    pub fn transaction(&self, hash: B256) -> BackendResult<Option<MinedTransaction>> {
        match self.chain().transaction_lookup(hash)? {
            TransactionLookup::Found(mined) => Ok(Some(mined)),
            TransactionLookup::NotFound => Ok(None),
            TransactionLookup::Indexing => {
                debug!(target: "eth_backend", %hash, "Transaction lookup hit unfinished index");
                Err(BackendError::IndexingIncomplete)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        BackendComponents, BackendConfig, BackendError, BackendTypes, EthBackend, LazyTransaction,
        TransactionPool,
        test_utils::{
            TestBloomIndexer, TestChain, TestDownloader, TestEngine, TestFeeOracle, TestHarness,
            TestMiner, test_transaction,
        },
    };
    use alloy_consensus::TxEnvelope;
    use alloy_primitives::{Address, B256};
    use eth_backend_types::{
        AccountPoolContent, NewTransactionsEvent, PendingFilter, PoolContent, PoolError,
        PoolStats,
    };
    use mockall::mock;
    use std::{collections::BTreeMap, sync::Arc};
    use tokio::sync::broadcast;

    #[derive(Debug, Clone)]
    pub struct StaticLazy {
        hash: B256,
        tx: Option<TxEnvelope>,
    }

    impl LazyTransaction for StaticLazy {
        fn hash(&self) -> B256 {
            self.hash
        }

        fn resolve(&self) -> Option<TxEnvelope> {
            self.tx.clone()
        }
    }

    mock! {
        #[derive(Debug)]
        pub Pool {}

        impl TransactionPool for Pool {
            type Transaction = StaticLazy;

            fn add_transaction(&self, tx: TxEnvelope) -> Result<(), PoolError>;
            fn get(&self, hash: B256) -> Option<TxEnvelope>;
            fn nonce(&self, address: Address) -> u64;
            fn stats(&self) -> PoolStats;
            fn content(&self) -> PoolContent;
            fn content_from(&self, address: Address) -> AccountPoolContent;
            fn pending(&self, filter: PendingFilter) -> BTreeMap<Address, Vec<StaticLazy>>;
            fn subscribe_transactions(
                &self,
                include_reorgs: bool,
            ) -> broadcast::Receiver<NewTransactionsEvent>;
        }
    }

    #[derive(Debug)]
    struct MockPoolTypes;

    impl BackendTypes for MockPoolTypes {
        type Chain = TestChain;
        type Miner = TestMiner;
        type Pool = MockPool;
        type Oracle = TestFeeOracle;
        type Downloader = TestDownloader;
        type BloomIndexer = TestBloomIndexer;
        type Engine = TestEngine;
    }

    fn backend_with_pool(pool: MockPool) -> EthBackend<MockPoolTypes> {
        let (bloom_requests, _) = async_channel::unbounded();
        EthBackend::new(
            BackendComponents {
                chain: Arc::new(TestChain::new(1)),
                miner: Arc::new(TestMiner::default()),
                pool: Arc::new(pool),
                oracle: Arc::new(TestFeeOracle::default()),
                downloader: Arc::new(TestDownloader::default()),
                bloom_indexer: Arc::new(TestBloomIndexer::default()),
                engine: Arc::new(TestEngine),
                bloom_requests,
                local_tracker: None,
            },
            BackendConfig::default(),
        )
    }

    #[test]
    fn test_pool_transactions_skip_evicted() {
        let kept = test_transaction(0);
        let also_kept = test_transaction(1);
        let evicted = test_transaction(2);

        let mut pool = MockPool::new();
        let snapshot = BTreeMap::from([
            (
                Address::repeat_byte(0x01),
                vec![
                    StaticLazy { hash: *kept.tx_hash(), tx: Some(kept.clone()) },
                    StaticLazy { hash: *evicted.tx_hash(), tx: None },
                ],
            ),
            (
                Address::repeat_byte(0x02),
                vec![StaticLazy { hash: *also_kept.tx_hash(), tx: Some(also_kept.clone()) }],
            ),
        ]);
        pool.expect_pending()
            .withf(|filter| *filter == PendingFilter::default())
            .times(1)
            .return_once(move |_| snapshot);

        let backend = backend_with_pool(pool);
        assert_eq!(backend.pool_transactions(), vec![kept, also_kept]);
    }

    #[test]
    fn test_pool_rejection_is_returned_verbatim() {
        let mut pool = MockPool::new();
        pool.expect_add_transaction()
            .times(1)
            .returning(|_| Err(PoolError::NonceTooLow { expected: 5, actual: 3 }));

        let backend = backend_with_pool(pool);
        let err = backend.send_transaction(test_transaction(3)).unwrap_err();
        assert_eq!(err, BackendError::Pool(PoolError::NonceTooLow { expected: 5, actual: 3 }));
    }

    #[test]
    fn test_new_transaction_feed_includes_reorgs() {
        let (sender, _) = broadcast::channel(4);
        let mut pool = MockPool::new();
        pool.expect_subscribe_transactions()
            .withf(|include_reorgs| *include_reorgs)
            .times(1)
            .returning(move |_| sender.subscribe());

        let backend = backend_with_pool(pool);
        let _feed = backend.subscribe_new_transactions();
    }

    #[test]
    fn test_local_tracking_happens_before_admission() {
        let harness = TestHarness::new(1);
        let tx = test_transaction(0);
        harness.pool.reject_next(PoolError::Underpriced);

        let err = harness.backend.send_transaction(tx.clone()).unwrap_err();
        assert_eq!(err, PoolError::Underpriced.into());
        assert_eq!(harness.tracker.tracked(), vec![*tx.tx_hash()]);
        assert_eq!(harness.backend.pool_transaction(*tx.tx_hash()), None);
    }

    #[test]
    fn test_send_then_read_back_from_pool() {
        let harness = TestHarness::new(1);
        let tx = test_transaction(0);
        harness.backend.send_transaction(tx.clone()).unwrap();

        assert_eq!(harness.backend.pool_transaction(*tx.tx_hash()), Some(tx.clone()));
        assert_eq!(harness.backend.pool_stats(), PoolStats { pending: 1, queued: 0 });
        assert_eq!(harness.backend.pool_transactions(), vec![tx.clone()]);

        let sender = harness.pool.default_sender();
        assert_eq!(harness.backend.pool_nonce(sender), 1);
        assert_eq!(harness.backend.pool_content_from(sender).pending, vec![tx.clone()]);
        assert_eq!(harness.backend.pool_content().pending[&sender], vec![tx.clone()]);

        let err = harness.backend.send_transaction(tx.clone()).unwrap_err();
        assert_eq!(err, PoolError::AlreadyKnown(*tx.tx_hash()).into());
    }

    #[test]
    fn test_lookup_while_indexing() {
        let harness = TestHarness::new(2);
        harness.chain.set_index_remaining(10);

        let err = harness.backend.transaction(B256::repeat_byte(0x99)).unwrap_err();
        assert_eq!(err, BackendError::IndexingIncomplete);
        assert!(err.is_retryable());

        harness.chain.set_index_remaining(0);
        assert_eq!(harness.backend.transaction(B256::repeat_byte(0x99)).unwrap(), None);
    }

    #[test]
    fn test_lookup_mined_transaction() {
        let harness = TestHarness::new(2);
        let tx = test_transaction(7);
        let header = harness.chain.mine(vec![test_transaction(6), tx.clone()]);

        let mined = harness.backend.transaction(*tx.tx_hash()).unwrap().unwrap();
        assert_eq!(mined.transaction, tx);
        assert_eq!(mined.location.block_hash, header.hash());
        assert_eq!(mined.location.block_number, 3);
        assert_eq!(mined.location.index, 1);
    }
}
