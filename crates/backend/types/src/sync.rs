//! Sync and indexing progress.

use serde::{Deserialize, Serialize};

/// Progress of the chain download combined with the transaction indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    /// Block the current sync cycle started at.
    pub starting_block: u64,
    /// Block the node is currently at.
    pub current_block: u64,
    /// Highest block known from peers.
    pub highest_block: u64,
    /// Number of blocks whose transactions are indexed.
    pub tx_index_finished_blocks: u64,
    /// Number of blocks whose transactions still need indexing.
    pub tx_index_remaining_blocks: u64,
}

impl SyncProgress {
    /// Returns `true` once the chain is synced and every transaction is indexed.
    pub const fn is_done(&self) -> bool {
        self.current_block >= self.highest_block && self.tx_index_remaining_blocks == 0
    }
}

/// Progress of the background transaction indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIndexProgress {
    /// Number of indexed blocks.
    pub indexed: u64,
    /// Number of blocks left to index.
    pub remaining: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_progress_done_requires_index() {
        let mut progress =
            SyncProgress { current_block: 10, highest_block: 10, ..Default::default() };
        assert!(progress.is_done());

        progress.tx_index_remaining_blocks = 3;
        assert!(!progress.is_done());
    }

    #[test]
    fn test_sync_progress_serde_field_names() {
        let progress = SyncProgress { tx_index_finished_blocks: 4, ..Default::default() };
        let json = serde_json::to_value(progress).unwrap();
        assert_eq!(json["txIndexFinishedBlocks"], 4);
    }
}
