//! Events published by the chain store and the transaction pool.

use crate::SealedHeader;
use alloy_consensus::TxEnvelope;
use alloy_primitives::Log;

/// A block was inserted into the canonical chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    /// Header of the inserted block.
    pub header: SealedHeader,
}

/// The canonical head changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHeadEvent {
    /// The new head.
    pub header: SealedHeader,
}

/// Logs were dropped from the canonical chain by a reorg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedLogsEvent {
    /// The removed logs.
    pub logs: Vec<Log>,
}

/// Transactions were admitted to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransactionsEvent {
    /// The admitted transactions.
    pub transactions: Vec<TxEnvelope>,
}
