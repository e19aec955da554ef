//! Error types shared by the backend and its collaborators.

use alloy_primitives::B256;
use thiserror::Error;

/// A result returned by the chain store.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by the chain store while reading chain data or state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The state for the given root has been pruned or was never written.
    #[error("state for root {0} is not available")]
    StateNotAvailable(B256),

    /// The head could not be rewound to the requested block.
    #[error("cannot rewind head to block {0}")]
    SetHead(u64),

    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(String),
}

/// Errors raised by the transaction pool when admitting a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The transaction is already in the pool.
    #[error("already known: {0}")]
    AlreadyKnown(B256),

    /// The transaction nonce is lower than the sender's next nonce.
    #[error("nonce too low: next nonce {expected}, tx nonce {actual}")]
    NonceTooLow {
        /// The next nonce of the sender.
        expected: u64,
        /// The nonce of the rejected transaction.
        actual: u64,
    },

    /// The transaction does not pay enough to enter the pool.
    #[error("transaction underpriced")]
    Underpriced,

    /// The sender cannot cover `gas * price + value`.
    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,

    /// The pool is at capacity.
    #[error("txpool is full")]
    PoolFull,

    /// Any other admission failure.
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the fee oracle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeeOracleError {
    /// A reward percentile is out of range or out of order.
    #[error("invalid reward percentile: {0}")]
    InvalidPercentile(f64),

    /// The requested window ends after the current head.
    #[error("request beyond head block: requested {requested}, head {head}")]
    BeyondHead {
        /// The requested last block.
        requested: u64,
        /// The current head.
        head: u64,
    },

    /// The oracle failed to read chain data.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors building a [`ChainRef`](crate::ChainRef) from request input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainRefError {
    /// Neither a block number nor a block hash was supplied.
    #[error("invalid arguments; neither block nor hash specified")]
    Missing,

    /// Both a block number and a block hash were supplied.
    #[error("cannot specify both block hash and block number, choose one or the other")]
    Conflicting,

    /// The operation needs a concrete hash and number, not a tag.
    #[error("invalid arguments; expect hash and no special block numbers")]
    ConcreteBlockRequired,

    /// The reference could not be parsed.
    #[error("invalid block reference: {0}")]
    Malformed(String),
}
