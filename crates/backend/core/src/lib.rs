//! Chain-reference resolution and state-access backend.
//!
//! [`EthBackend`] sits between the request-serving layer and a node's chain store, pending
//! block builder, transaction pool and fee oracle. It turns symbolic or concrete
//! [`ChainRef`]s into validated headers, blocks and state handles, and exposes transaction,
//! receipt, log, pool and fee access on top of its collaborators.
#![doc(issue_tracker_base_url = "https://github.com/op-rs/kona/issues/")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod backend;
pub use backend::{BackendComponents, EthBackend};

pub mod bloom;
pub use bloom::{BLOOM_BITS_BLOCKS, BloomRequest, BloomRetrieval, MatcherSession};

mod config;
pub use config::{
    BackendArgs, BackendConfig, BloomConfig, DEFAULT_RPC_EVM_TIMEOUT, DEFAULT_RPC_GAS_CAP,
    DEFAULT_RPC_TX_FEE_CAP,
};

mod error;
pub use error::{BackendError, BackendResult, ErrorKind, NotFoundError, UnavailableError};

mod metrics;
pub(crate) use metrics::Metrics;

mod traits;
pub use traits::{
    BackendTypes, BlockReader, BloomIndexer, ChainEvents, ChainSpecReader, ChainStore,
    FeeOracle, HeadWriter, HeaderReader, LazyTransaction, LocalTxTracker,
    PendingBlockProvider, StateOf, StateReader, SyncDownloader, TransactionPool,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use eth_backend_types::*;
