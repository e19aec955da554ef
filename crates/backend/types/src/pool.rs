//! Transaction pool snapshots.

use alloy_consensus::TxEnvelope;
use alloy_primitives::Address;
use std::collections::BTreeMap;

/// All pending and queued transactions of the pool, grouped by sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolContent {
    /// Executable transactions.
    pub pending: BTreeMap<Address, Vec<TxEnvelope>>,
    /// Transactions waiting on a nonce gap or funds.
    pub queued: BTreeMap<Address, Vec<TxEnvelope>>,
}

/// The pending and queued transactions of a single sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPoolContent {
    /// Executable transactions, ordered by nonce.
    pub pending: Vec<TxEnvelope>,
    /// Transactions waiting on a nonce gap or funds, ordered by nonce.
    pub queued: Vec<TxEnvelope>,
}

/// Number of runnable and blocked transactions in the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Executable transactions.
    pub pending: usize,
    /// Non-executable transactions.
    pub queued: usize,
}

/// Restricts which pending transactions the pool hands out.
///
/// The default filter returns everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFilter {
    /// Minimum effective tip.
    pub min_tip: Option<u128>,
    /// Base fee used to compute the effective tip.
    pub base_fee: Option<u64>,
    /// Blob fee a blob transaction must cover.
    pub blob_fee: Option<u128>,
    /// Only return non-blob transactions.
    pub only_plain_txs: bool,
    /// Only return blob transactions.
    pub only_blob_txs: bool,
}
