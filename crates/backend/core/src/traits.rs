//! Collaborator interfaces the backend is composed from.

use alloy_consensus::{ReceiptEnvelope, TxEnvelope};
use alloy_eips::{BlockNumberOrTag, eip7840::BlobParams};
use alloy_primitives::{Address, B256, Log, U256};
use alloy_rpc_types_eth::FeeHistory;
use async_trait::async_trait;
use eth_backend_types::{
    AccountPoolContent, BlockBody, ChainEvent, ChainHeadEvent, FeeOracleError,
    NewTransactionsEvent, PendingBlock, PendingFilter, PoolContent, PoolError, PoolStats,
    ProviderResult, RemovedLogsEvent, SealedBlock, SealedHeader, SyncProgress, TransactionLookup,
    TxIndexProgress,
};
use std::{collections::BTreeMap, fmt::Debug};
use tokio::sync::broadcast;

/// Static chain configuration.
pub trait ChainSpecReader {
    /// Returns the chain id.
    fn chain_id(&self) -> u64;

    /// Returns the blob fee parameters active at `timestamp`, or `None` before blobs activate.
    fn blob_params_at_timestamp(&self, timestamp: u64) -> Option<BlobParams>;
}

/// Header access and the chain's head pointers.
pub trait HeaderReader {
    /// Returns the header the header chain has advanced to. During header-first sync this may
    /// run ahead of [`HeaderReader::current_block`].
    fn current_header(&self) -> SealedHeader;

    /// Returns the header of the current canonical head block.
    fn current_block(&self) -> SealedHeader;

    /// Returns the header of the latest safe block, if one has been set.
    fn current_safe_header(&self) -> Option<SealedHeader>;

    /// Returns the header of the latest finalized block, if one has been set.
    fn current_finalized_header(&self) -> Option<SealedHeader>;

    /// Looks a header up by hash, canonical or not.
    fn header_by_hash(&self, hash: B256) -> ProviderResult<Option<SealedHeader>>;

    /// Looks the canonical header at `number` up.
    fn header_by_number(&self, number: u64) -> ProviderResult<Option<SealedHeader>>;

    /// Returns the canonical hash at `number`.
    fn canonical_hash(&self, number: u64) -> ProviderResult<Option<B256>>;
}

/// Block, body, receipt, log and transaction index access.
pub trait BlockReader {
    /// Returns the full block with the given hash and number.
    fn block(&self, hash: B256, number: u64) -> ProviderResult<Option<SealedBlock>>;

    /// Returns the body of the block with the given hash.
    fn body(&self, hash: B256) -> ProviderResult<Option<BlockBody>>;

    /// Returns the receipts of the block with the given hash.
    fn receipts_by_hash(&self, hash: B256) -> ProviderResult<Option<Vec<ReceiptEnvelope>>>;

    /// Returns the logs of the block, grouped per transaction.
    fn logs(&self, hash: B256, number: u64) -> ProviderResult<Option<Vec<Vec<Log>>>>;

    /// Looks a mined transaction up in the transaction index.
    fn transaction_lookup(&self, hash: B256) -> ProviderResult<TransactionLookup>;

    /// Returns the progress of the background transaction indexer.
    fn tx_index_progress(&self) -> ProviderResult<TxIndexProgress>;
}

/// State access.
pub trait StateReader {
    /// A read-only view of the world state at some block.
    type State: Debug + Send + Sync;

    /// Opens the state with the given root.
    fn state_at(&self, root: B256) -> ProviderResult<Self::State>;
}

/// Chain event feeds.
pub trait ChainEvents {
    /// Subscribes to blocks inserted into the canonical chain.
    fn subscribe_chain_events(&self) -> broadcast::Receiver<ChainEvent>;

    /// Subscribes to head changes.
    fn subscribe_chain_head_events(&self) -> broadcast::Receiver<ChainHeadEvent>;

    /// Subscribes to logs of newly inserted canonical blocks.
    fn subscribe_logs(&self) -> broadcast::Receiver<Vec<Log>>;

    /// Subscribes to logs dropped from the canonical chain by a reorg.
    fn subscribe_removed_logs(&self) -> broadcast::Receiver<RemovedLogsEvent>;
}

/// Rewinding of the canonical head.
pub trait HeadWriter {
    /// Rewinds the canonical chain to `number`.
    fn set_head(&self, number: u64) -> ProviderResult<()>;
}

/// The node's chain store: the canonical chain, its state and its event feeds.
pub trait ChainStore:
    ChainSpecReader
    + HeaderReader
    + BlockReader
    + StateReader
    + ChainEvents
    + HeadWriter
    + Debug
    + Send
    + Sync
{
}

impl<T> ChainStore for T where
    T: ChainSpecReader
        + HeaderReader
        + BlockReader
        + StateReader
        + ChainEvents
        + HeadWriter
        + Debug
        + Send
        + Sync
{
}

/// The block builder's current draft.
pub trait PendingBlockProvider: Debug + Send + Sync {
    /// The state type carried by the draft.
    type State;

    /// Returns the current draft block, its receipts and post-state, taken together.
    fn pending(&self) -> Option<PendingBlock<Self::State>>;
}

/// A pool transaction whose body is loaded on demand.
///
/// The pool may evict the transaction between enumeration and resolution.
pub trait LazyTransaction: Debug + Send + Sync {
    /// Returns the transaction hash.
    fn hash(&self) -> B256;

    /// Loads the transaction, or returns `None` if it left the pool.
    fn resolve(&self) -> Option<TxEnvelope>;
}

/// The transaction pool.
pub trait TransactionPool: Debug + Send + Sync {
    /// The lazily loaded transaction handed out by [`TransactionPool::pending`].
    type Transaction: LazyTransaction;

    /// Submits a transaction.
    fn add_transaction(&self, tx: TxEnvelope) -> Result<(), PoolError>;

    /// Returns a pooled transaction by hash.
    fn get(&self, hash: B256) -> Option<TxEnvelope>;

    /// Returns the next nonce of `address`, accounting for pooled transactions.
    fn nonce(&self, address: Address) -> u64;

    /// Returns the number of pending and queued transactions.
    fn stats(&self) -> PoolStats;

    /// Returns every pooled transaction grouped by sender.
    fn content(&self) -> PoolContent;

    /// Returns the pooled transactions of a single sender.
    fn content_from(&self, address: Address) -> AccountPoolContent;

    /// Returns the executable transactions matching `filter`, grouped by sender.
    fn pending(&self, filter: PendingFilter) -> BTreeMap<Address, Vec<Self::Transaction>>;

    /// Subscribes to admitted transactions. With `include_reorgs`, transactions re-injected
    /// after a reorg are announced as well.
    fn subscribe_transactions(&self, include_reorgs: bool)
    -> broadcast::Receiver<NewTransactionsEvent>;
}

/// Gas price oracle.
#[async_trait]
pub trait FeeOracle: Debug + Send + Sync {
    /// Suggests a priority fee for a transaction to be included in the next block.
    async fn suggest_tip_cap(&self) -> Result<U256, FeeOracleError>;

    /// Returns the fee history of `block_count` blocks ending at `last_block`.
    async fn fee_history(
        &self,
        block_count: u64,
        last_block: BlockNumberOrTag,
        reward_percentiles: &[f64],
    ) -> Result<FeeHistory, FeeOracleError>;
}

/// Tracks locally submitted transactions so they can be resubmitted.
pub trait LocalTxTracker: Debug + Send + Sync {
    /// Records a local transaction.
    fn track(&self, tx: &TxEnvelope);
}

/// The chain downloader.
pub trait SyncDownloader: Debug + Send + Sync {
    /// Returns the progress of the current sync cycle.
    fn progress(&self) -> SyncProgress;

    /// Aborts any running sync cycle.
    fn cancel(&self);
}

/// The bloom-bits indexer.
pub trait BloomIndexer: Debug + Send + Sync {
    /// Returns the number of fully indexed sections.
    fn sections(&self) -> u64;
}

/// The collaborator types an [`EthBackend`](crate::EthBackend) is built from.
pub trait BackendTypes: Debug + Send + Sync + 'static {
    /// The chain store.
    type Chain: ChainStore;
    /// The pending block builder. Its drafts carry the chain store's state type.
    type Miner: PendingBlockProvider<State = <Self::Chain as StateReader>::State>;
    /// The transaction pool.
    type Pool: TransactionPool;
    /// The gas price oracle.
    type Oracle: FeeOracle;
    /// The chain downloader.
    type Downloader: SyncDownloader;
    /// The bloom-bits indexer.
    type BloomIndexer: BloomIndexer;
    /// The consensus engine. Handed out as is.
    type Engine: Debug + Send + Sync;
}

/// The state type of a backend's chain store.
pub type StateOf<N> = <<N as BackendTypes>::Chain as StateReader>::State;
