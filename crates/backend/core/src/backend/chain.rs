//! Receipts, logs, chain feeds, sync status and head control.

use crate::{
    BackendResult, BackendTypes, BlockReader, ChainEvents, EthBackend, HeadWriter, SyncDownloader,
};
use alloy_consensus::ReceiptEnvelope;
use alloy_primitives::{B256, Log};
use eth_backend_types::{ChainEvent, ChainHeadEvent, RemovedLogsEvent, SyncProgress};
use tokio::sync::broadcast;

impl<N: BackendTypes> EthBackend<N> {
    /// Returns the receipts of the block with the given hash, or none if the block is unknown.
    pub fn receipts(&self, hash: B256) -> BackendResult<Vec<ReceiptEnvelope>> {
        Ok(self.chain().receipts_by_hash(hash)?.unwrap_or_default())
    }

    /// Returns the logs of the block with the given hash and number, grouped per transaction.
    /// An unknown block has no logs.
    pub fn logs(&self, hash: B256, number: u64) -> BackendResult<Vec<Vec<Log>>> {
        Ok(self.chain().logs(hash, number)?.unwrap_or_default())
    }

    /// Subscribes to blocks inserted into the canonical chain.
    pub fn subscribe_chain_events(&self) -> broadcast::Receiver<ChainEvent> {
        self.chain().subscribe_chain_events()
    }

    /// Subscribes to head changes.
    pub fn subscribe_chain_head_events(&self) -> broadcast::Receiver<ChainHeadEvent> {
        self.chain().subscribe_chain_head_events()
    }

    /// Subscribes to logs of newly inserted canonical blocks.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<Vec<Log>> {
        self.chain().subscribe_logs()
    }

    /// Subscribes to logs dropped from the canonical chain by reorgs.
    pub fn subscribe_removed_logs(&self) -> broadcast::Receiver<RemovedLogsEvent> {
        self.chain().subscribe_removed_logs()
    }

    /// Returns the downloader's progress together with the transaction indexer's.
    ///
    /// If the indexer's progress cannot be read, its fields are left at zero.
    pub fn sync_progress(&self) -> SyncProgress {
        let mut progress = self.downloader().progress();
        match self.chain().tx_index_progress() {
            Ok(index) => {
                progress.tx_index_finished_blocks = index.indexed;
                progress.tx_index_remaining_blocks = index.remaining;
            }
            Err(err) => {
                debug!(target: "eth_backend", %err, "Transaction index progress unavailable");
            }
        }
        progress
    }

    /// Rewinds the canonical chain to `number`.
    ///
    /// Any running sync is cancelled first.
    pub fn set_head(&self, number: u64) -> BackendResult<()> {
        self.downloader().cancel();
        info!(target: "eth_backend", number, "Rewinding canonical head");
        self.chain().set_head(number)?;
        Ok(())
    }
}
