//! Backend configuration and its CLI flags.

use crate::bloom::{
    DEFAULT_BLOOM_FILTER_THREADS, DEFAULT_BLOOM_RETRIEVAL_BATCH, DEFAULT_BLOOM_RETRIEVAL_WAIT,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, time::Duration};

/// Default gas cap for simulated calls.
pub const DEFAULT_RPC_GAS_CAP: u64 = 50_000_000;

/// Default timeout for simulated calls.
pub const DEFAULT_RPC_EVM_TIMEOUT: Duration = Duration::from_millis(DEFAULT_RPC_EVM_TIMEOUT_MS);

const DEFAULT_RPC_EVM_TIMEOUT_MS: u64 = 5_000;

/// Default cap on the fee of a submitted transaction, in ether.
pub const DEFAULT_RPC_TX_FEE_CAP: f64 = 1.0;

/// Settings the backend reports to the request-serving layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendConfig {
    /// Whether RPC is reachable from outside the process.
    pub ext_rpc_enabled: bool,
    /// Whether transactions without replay protection are accepted.
    pub allow_unprotected_txs: bool,
    /// Gas cap for simulated calls. Zero means no cap.
    pub rpc_gas_cap: u64,
    /// Timeout for simulated calls. Zero means no timeout.
    pub rpc_evm_timeout: Duration,
    /// Cap on the fee of a submitted transaction, in ether. Zero means no cap.
    pub rpc_tx_fee_cap: f64,
    /// Bloom retrieval service settings.
    pub bloom: BloomConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ext_rpc_enabled: false,
            allow_unprotected_txs: false,
            rpc_gas_cap: DEFAULT_RPC_GAS_CAP,
            rpc_evm_timeout: DEFAULT_RPC_EVM_TIMEOUT,
            rpc_tx_fee_cap: DEFAULT_RPC_TX_FEE_CAP,
            bloom: BloomConfig::default(),
        }
    }
}

/// Bloom retrieval service settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BloomConfig {
    /// Number of retrieval workers per filter session.
    pub filter_threads: NonZeroUsize,
    /// Maximum number of sections fetched per request.
    pub retrieval_batch: NonZeroUsize,
    /// How long a worker waits for a batch to fill before sending it.
    pub retrieval_wait: Duration,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            filter_threads: DEFAULT_BLOOM_FILTER_THREADS,
            retrieval_batch: DEFAULT_BLOOM_RETRIEVAL_BATCH,
            retrieval_wait: DEFAULT_BLOOM_RETRIEVAL_WAIT,
        }
    }
}

/// Backend CLI flags.
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct BackendArgs {
    /// Serve RPC to external clients
    #[arg(long = "rpc.external", env = "ETH_BACKEND_RPC_EXTERNAL", default_value = "false")]
    pub ext_rpc_enabled: bool,

    /// Accept transactions without replay protection
    #[arg(
        long = "rpc.allow-unprotected-txs",
        env = "ETH_BACKEND_RPC_ALLOW_UNPROTECTED_TXS",
        default_value = "false"
    )]
    pub allow_unprotected_txs: bool,

    /// Gas cap for simulated calls (0 = no cap)
    #[arg(
        long = "rpc.gascap",
        env = "ETH_BACKEND_RPC_GAS_CAP",
        default_value_t = DEFAULT_RPC_GAS_CAP
    )]
    pub rpc_gas_cap: u64,

    /// Timeout for simulated calls in milliseconds (0 = no timeout)
    #[arg(
        long = "rpc.evmtimeout-ms",
        env = "ETH_BACKEND_RPC_EVM_TIMEOUT_MS",
        default_value_t = DEFAULT_RPC_EVM_TIMEOUT_MS
    )]
    pub rpc_evm_timeout_ms: u64,

    /// Fee cap for submitted transactions in ether (0 = no cap)
    #[arg(
        long = "rpc.txfeecap",
        env = "ETH_BACKEND_RPC_TX_FEE_CAP",
        default_value_t = DEFAULT_RPC_TX_FEE_CAP
    )]
    pub rpc_tx_fee_cap: f64,

    /// Number of bloom retrieval workers per log filter
    #[arg(
        long = "bloom.threads",
        env = "ETH_BACKEND_BLOOM_THREADS",
        default_value_t = DEFAULT_BLOOM_FILTER_THREADS
    )]
    pub bloom_filter_threads: NonZeroUsize,

    /// Maximum number of bloom sections fetched per request
    #[arg(
        long = "bloom.batch",
        env = "ETH_BACKEND_BLOOM_BATCH",
        default_value_t = DEFAULT_BLOOM_RETRIEVAL_BATCH
    )]
    pub bloom_retrieval_batch: NonZeroUsize,

    /// Time a bloom retrieval batch may wait to fill, in milliseconds
    #[arg(long = "bloom.wait-ms", env = "ETH_BACKEND_BLOOM_WAIT_MS", default_value_t = 0)]
    pub bloom_retrieval_wait_ms: u64,
}

impl From<BackendArgs> for BackendConfig {
    fn from(args: BackendArgs) -> Self {
        Self {
            ext_rpc_enabled: args.ext_rpc_enabled,
            allow_unprotected_txs: args.allow_unprotected_txs,
            rpc_gas_cap: args.rpc_gas_cap,
            rpc_evm_timeout: Duration::from_millis(args.rpc_evm_timeout_ms),
            rpc_tx_fee_cap: args.rpc_tx_fee_cap,
            bloom: BloomConfig {
                filter_threads: args.bloom_filter_threads,
                retrieval_batch: args.bloom_retrieval_batch,
                retrieval_wait: Duration::from_millis(args.bloom_retrieval_wait_ms),
            },
        }
    }
}
