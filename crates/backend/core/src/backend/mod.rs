//! The [`EthBackend`] and the components it is built from.

use crate::{BackendConfig, BackendTypes, BloomRequest, ChainSpecReader, LocalTxTracker, Metrics};
use alloy_eips::eip7840::BlobParams;
use std::{sync::Arc, time::Duration};

mod chain;
mod fees;
mod resolve;
mod transactions;

/// The collaborators an [`EthBackend`] fronts.
#[derive(Debug)]
pub struct BackendComponents<N: BackendTypes> {
    /// The chain store.
    pub chain: Arc<N::Chain>,
    /// The pending block builder.
    pub miner: Arc<N::Miner>,
    /// The transaction pool.
    pub pool: Arc<N::Pool>,
    /// The gas price oracle.
    pub oracle: Arc<N::Oracle>,
    /// The chain downloader.
    pub downloader: Arc<N::Downloader>,
    /// The bloom-bits indexer.
    pub bloom_indexer: Arc<N::BloomIndexer>,
    /// The consensus engine.
    pub engine: Arc<N::Engine>,
    /// Queue of bloom-bit retrievals served by the bloom-bits database.
    pub bloom_requests: async_channel::Sender<BloomRequest>,
    /// Tracker of locally submitted transactions, if local tracking is enabled.
    pub local_tracker: Option<Arc<dyn LocalTxTracker>>,
}

/// Resolves chain references into headers, blocks and state, and fronts the transaction pool
/// and fee oracle.
///
/// Cheap to clone. Every operation only reads shared collaborators; consistency between
/// independent calls is not guaranteed, since the chain may advance or reorg in between.
#[derive(Debug)]
pub struct EthBackend<N: BackendTypes> {
    inner: Arc<EthBackendInner<N>>,
}

#[derive(Debug)]
struct EthBackendInner<N: BackendTypes> {
    components: BackendComponents<N>,
    config: BackendConfig,
}

impl<N: BackendTypes> Clone for EthBackend<N> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<N: BackendTypes> EthBackend<N> {
    /// Creates a new [`EthBackend`].
    pub fn new(components: BackendComponents<N>, config: BackendConfig) -> Self {
        Metrics::init();
        debug!(
            target: "eth_backend",
            chain_id = components.chain.chain_id(),
            local_tracking = components.local_tracker.is_some(),
            "Creating backend"
        );
        Self { inner: Arc::new(EthBackendInner { components, config }) }
    }

    /// Returns the chain store.
    pub fn chain(&self) -> &N::Chain {
        &self.inner.components.chain
    }

    /// Returns the pending block builder.
    pub fn miner(&self) -> &N::Miner {
        &self.inner.components.miner
    }

    /// Returns the transaction pool.
    pub fn pool(&self) -> &N::Pool {
        &self.inner.components.pool
    }

    /// Returns the gas price oracle.
    pub fn oracle(&self) -> &N::Oracle {
        &self.inner.components.oracle
    }

    /// Returns the chain downloader.
    pub fn downloader(&self) -> &N::Downloader {
        &self.inner.components.downloader
    }

    /// Returns the bloom-bits indexer.
    pub fn bloom_indexer(&self) -> &N::BloomIndexer {
        &self.inner.components.bloom_indexer
    }

    /// Returns the consensus engine.
    pub fn engine(&self) -> Arc<N::Engine> {
        Arc::clone(&self.inner.components.engine)
    }

    pub(crate) fn local_tracker(&self) -> Option<&dyn LocalTxTracker> {
        self.inner.components.local_tracker.as_deref()
    }

    pub(crate) fn bloom_requests(&self) -> &async_channel::Sender<BloomRequest> {
        &self.inner.components.bloom_requests
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    /// Returns the chain id.
    pub fn chain_id(&self) -> u64 {
        self.chain().chain_id()
    }

    /// Returns the blob fee parameters active at `timestamp`.
    pub fn blob_params_at_timestamp(&self, timestamp: u64) -> Option<BlobParams> {
        self.chain().blob_params_at_timestamp(timestamp)
    }

    /// Whether RPC is reachable from outside the process.
    pub fn ext_rpc_enabled(&self) -> bool {
        self.config().ext_rpc_enabled
    }

    /// Whether transactions without replay protection are accepted.
    pub fn unprotected_allowed(&self) -> bool {
        self.config().allow_unprotected_txs
    }

    /// Gas cap for simulated calls.
    pub fn rpc_gas_cap(&self) -> u64 {
        self.config().rpc_gas_cap
    }

    /// Timeout for simulated calls.
    pub fn rpc_evm_timeout(&self) -> Duration {
        self.config().rpc_evm_timeout
    }

    /// Cap on the fee of a submitted transaction, in ether.
    pub fn rpc_tx_fee_cap(&self) -> f64 {
        self.config().rpc_tx_fee_cap
    }
}
