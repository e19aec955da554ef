//! Mined transaction lookups.

use alloy_consensus::TxEnvelope;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Where a mined transaction lives in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLocation {
    /// Hash of the block containing the transaction.
    pub block_hash: B256,
    /// Number of the block containing the transaction.
    pub block_number: u64,
    /// Index of the transaction within the block.
    pub index: u64,
}

/// A mined transaction and its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedTransaction {
    /// The transaction.
    pub transaction: TxEnvelope,
    /// Where the transaction was included.
    pub location: TransactionLocation,
}

/// Outcome of looking a transaction hash up in the chain store's transaction index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLookup {
    /// The transaction is mined and indexed.
    Found(MinedTransaction),
    /// The transaction is not indexed and the index covers the whole chain.
    NotFound,
    /// The transaction is not indexed, but background indexing has not finished, so it may
    /// still show up.
    Indexing,
}
