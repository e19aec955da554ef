//! In-memory collaborators for testing code built on [`EthBackend`].

use crate::{
    BackendComponents, BackendConfig, BackendTypes, BloomIndexer, BloomRequest, EthBackend,
    FeeOracle, LocalTxTracker, PendingBlockProvider, SyncDownloader,
};
use alloy_consensus::{Signed, TxEnvelope, TxLegacy};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, B256, Bytes, Log, Signature, TxKind, U256, keccak256};
use alloy_rpc_types_eth::FeeHistory;
use async_trait::async_trait;
use eth_backend_types::{FeeOracleError, PendingBlock, SyncProgress};
use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

mod bloom;
pub use bloom::{TestMatcherSession, serve_bloom_requests};

mod chain;
pub use chain::{TestChain, TestState};

mod pool;
pub use pool::{TestLazyTransaction, TestPool};

/// Chain id used by [`TestHarness`].
pub const TEST_CHAIN_ID: u64 = 1337;

/// Block builder whose draft is set by the test.
#[derive(Debug, Default)]
pub struct TestMiner {
    pending: RwLock<Option<PendingBlock<TestState>>>,
}

impl TestMiner {
    /// Replaces the current draft.
    pub fn set_pending(&self, pending: PendingBlock<TestState>) {
        *self.pending.write().unwrap_or_else(PoisonError::into_inner) = Some(pending);
    }

    /// Drops the current draft.
    pub fn clear(&self) {
        *self.pending.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl PendingBlockProvider for TestMiner {
    type State = TestState;

    fn pending(&self) -> Option<PendingBlock<TestState>> {
        self.pending.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Fee oracle returning fixed answers.
#[derive(Debug, Default)]
pub struct TestFeeOracle {
    tip_cap: RwLock<U256>,
    history: RwLock<FeeHistory>,
}

impl TestFeeOracle {
    /// Sets the suggested tip cap.
    pub fn set_tip_cap(&self, tip_cap: U256) {
        *self.tip_cap.write().unwrap_or_else(PoisonError::into_inner) = tip_cap;
    }

    /// Sets the fee history returned for every request.
    pub fn set_history(&self, history: FeeHistory) {
        *self.history.write().unwrap_or_else(PoisonError::into_inner) = history;
    }
}

#[async_trait]
impl FeeOracle for TestFeeOracle {
    async fn suggest_tip_cap(&self) -> Result<U256, FeeOracleError> {
        Ok(*self.tip_cap.read().unwrap_or_else(PoisonError::into_inner))
    }

    async fn fee_history(
        &self,
        _block_count: u64,
        _last_block: BlockNumberOrTag,
        _reward_percentiles: &[f64],
    ) -> Result<FeeHistory, FeeOracleError> {
        Ok(self.history.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Downloader reporting fixed progress and counting cancellations.
#[derive(Debug, Default)]
pub struct TestDownloader {
    progress: RwLock<SyncProgress>,
    cancellations: AtomicUsize,
}

impl TestDownloader {
    /// Sets the reported progress.
    pub fn set_progress(&self, progress: SyncProgress) {
        *self.progress.write().unwrap_or_else(PoisonError::into_inner) = progress;
    }

    /// Returns how often the sync was cancelled.
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }
}

impl SyncDownloader for TestDownloader {
    fn progress(&self) -> SyncProgress {
        *self.progress.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Bloom indexer with a settable section count.
#[derive(Debug, Default)]
pub struct TestBloomIndexer {
    sections: AtomicU64,
}

impl TestBloomIndexer {
    /// Sets the number of indexed sections.
    pub fn set_sections(&self, sections: u64) {
        self.sections.store(sections, Ordering::SeqCst);
    }
}

impl BloomIndexer for TestBloomIndexer {
    fn sections(&self) -> u64 {
        self.sections.load(Ordering::SeqCst)
    }
}

/// Records the hashes of tracked local transactions.
#[derive(Debug, Default)]
pub struct TestTracker {
    tracked: RwLock<Vec<B256>>,
}

impl TestTracker {
    /// Returns the tracked hashes, in submission order.
    pub fn tracked(&self) -> Vec<B256> {
        self.tracked.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LocalTxTracker for TestTracker {
    fn track(&self, tx: &TxEnvelope) {
        self.tracked.write().unwrap_or_else(PoisonError::into_inner).push(*tx.tx_hash());
    }
}

/// Placeholder consensus engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TestEngine;

/// The in-memory collaborator set.
#[derive(Debug, Clone, Copy)]
pub struct TestBackendTypes;

impl BackendTypes for TestBackendTypes {
    type Chain = TestChain;
    type Miner = TestMiner;
    type Pool = TestPool;
    type Oracle = TestFeeOracle;
    type Downloader = TestDownloader;
    type BloomIndexer = TestBloomIndexer;
    type Engine = TestEngine;
}

/// An [`EthBackend`] over in-memory collaborators, with handles to drive them.
#[derive(Debug)]
pub struct TestHarness {
    /// The backend under test.
    pub backend: EthBackend<TestBackendTypes>,
    /// The chain store.
    pub chain: Arc<TestChain>,
    /// The block builder.
    pub miner: Arc<TestMiner>,
    /// The transaction pool.
    pub pool: Arc<TestPool>,
    /// The fee oracle.
    pub oracle: Arc<TestFeeOracle>,
    /// The downloader.
    pub downloader: Arc<TestDownloader>,
    /// The bloom indexer.
    pub bloom_indexer: Arc<TestBloomIndexer>,
    /// The local transaction tracker.
    pub tracker: Arc<TestTracker>,
    /// The bloom request queue, as seen by the bloom-bits database.
    pub bloom_requests: async_channel::Receiver<BloomRequest>,
}

impl TestHarness {
    /// Creates a harness whose canonical chain holds genesis plus `blocks` empty blocks.
    pub fn new(blocks: u64) -> Self {
        Self::with_config(blocks, BackendConfig::default())
    }

    /// Creates a harness with the given configuration.
    pub fn with_config(blocks: u64, config: BackendConfig) -> Self {
        let chain = Arc::new(TestChain::new(TEST_CHAIN_ID));
        chain.extend(blocks);

        let miner = Arc::new(TestMiner::default());
        let pool = Arc::new(TestPool::default());
        let oracle = Arc::new(TestFeeOracle::default());
        let downloader = Arc::new(TestDownloader::default());
        let bloom_indexer = Arc::new(TestBloomIndexer::default());
        let tracker = Arc::new(TestTracker::default());
        let (bloom_sender, bloom_requests) = async_channel::unbounded();

        let backend = EthBackend::new(
            BackendComponents {
                chain: Arc::clone(&chain),
                miner: Arc::clone(&miner),
                pool: Arc::clone(&pool),
                oracle: Arc::clone(&oracle),
                downloader: Arc::clone(&downloader),
                bloom_indexer: Arc::clone(&bloom_indexer),
                engine: Arc::new(TestEngine),
                bloom_requests: bloom_sender,
                local_tracker: Some(Arc::clone(&tracker) as Arc<dyn LocalTxTracker>),
            },
            config,
        );

        Self {
            backend,
            chain,
            miner,
            pool,
            oracle,
            downloader,
            bloom_indexer,
            tracker,
            bloom_requests,
        }
    }
}

/// Returns a legacy transaction with the given nonce. Transactions with distinct nonces have
/// distinct hashes.
pub fn test_transaction(nonce: u64) -> TxEnvelope {
    let tx = TxLegacy {
        chain_id: Some(TEST_CHAIN_ID),
        nonce,
        gas_price: 1_000_000_000,
        gas_limit: 21_000,
        to: TxKind::Call(Address::repeat_byte(0x22)),
        value: U256::from(nonce),
        input: Bytes::new(),
    };
    let signature = Signature::new(U256::from(1u64), U256::from(1u64), false);
    let hash = keccak256(nonce.to_be_bytes());
    TxEnvelope::Legacy(Signed::new_unchecked(tx, signature, hash))
}

/// Returns a log tagged with `tag`.
pub fn test_log(tag: u8) -> Log {
    Log::new_unchecked(
        Address::repeat_byte(tag),
        vec![B256::repeat_byte(tag)],
        Bytes::from(vec![tag]),
    )
}
