//! Types shared between the chain-reference resolution backend and the collaborators it
//! fronts: the chain store, the pending block builder, the transaction pool and the fee
//! oracle.
#![doc(issue_tracker_base_url = "https://github.com/op-rs/kona/issues/")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod chain_ref;
pub use chain_ref::ChainRef;

mod block;
pub use block::{Block, BlockBody, PendingBlock, SealedBlock, SealedHeader, seal_block};

mod error;
pub use error::{ChainRefError, FeeOracleError, PoolError, ProviderError, ProviderResult};

mod events;
pub use events::{ChainEvent, ChainHeadEvent, NewTransactionsEvent, RemovedLogsEvent};

mod pool;
pub use pool::{AccountPoolContent, PendingFilter, PoolContent, PoolStats};

mod sync;
pub use sync::{SyncProgress, TxIndexProgress};

mod transaction;
pub use transaction::{MinedTransaction, TransactionLocation, TransactionLookup};
