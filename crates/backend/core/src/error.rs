//! Errors returned by the backend.

use alloy_primitives::B256;
use derive_more::Display;
use eth_backend_types::{ChainRefError, FeeOracleError, PoolError, ProviderError};
use thiserror::Error;

/// A result returned by the backend.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors returned by the backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The referenced data does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Pending data was requested but the block builder has no draft.
    #[error(transparent)]
    Unavailable(#[from] UnavailableError),

    /// The block was required to be canonical but is not.
    #[error("hash is not currently canonical")]
    NotCanonical(B256),

    /// The transaction index has not caught up; the lookup may succeed later.
    #[error("transaction indexing is in progress")]
    IndexingIncomplete,

    /// The request arguments are malformed.
    #[error(transparent)]
    InvalidArgument(#[from] ChainRefError),

    /// The chain store failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The transaction pool rejected a transaction.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The fee oracle failed.
    #[error(transparent)]
    FeeOracle(#[from] FeeOracleError),
}

/// Data that was asked for and is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotFoundError {
    /// No finalized block has been set.
    #[error("finalized block not found")]
    FinalizedBlock,

    /// No safe block has been set.
    #[error("safe block not found")]
    SafeBlock,

    /// No header is stored under the hash.
    #[error("header for hash not found")]
    HeaderForHash(B256),

    /// The referenced header does not exist.
    #[error("header not found")]
    Header,

    /// The header resolved but the chain store has no body for it.
    #[error("header found, but block body is missing")]
    BlockBodyMissing(B256),

    /// No body is stored under the hash.
    #[error("block body not found")]
    BlockBody(B256),
}

/// Pending data requested while the block builder has no draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnavailableError {
    /// No pending block.
    #[error("pending block is not available")]
    PendingBlock,

    /// No pending state.
    #[error("pending state is not available")]
    PendingState,
}

/// Coarse classification of a [`BackendError`], used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// See [`BackendError::NotFound`].
    #[display("not_found")]
    NotFound,
    /// See [`BackendError::Unavailable`].
    #[display("unavailable")]
    Unavailable,
    /// See [`BackendError::NotCanonical`].
    #[display("not_canonical")]
    NotCanonical,
    /// See [`BackendError::IndexingIncomplete`].
    #[display("indexing_incomplete")]
    IndexingIncomplete,
    /// See [`BackendError::InvalidArgument`].
    #[display("invalid_argument")]
    InvalidArgument,
    /// See [`BackendError::Provider`].
    #[display("provider")]
    Provider,
    /// See [`BackendError::Pool`].
    #[display("pool")]
    Pool,
    /// See [`BackendError::FeeOracle`].
    #[display("fee_oracle")]
    FeeOracle,
}

impl BackendError {
    /// Returns the kind of the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::NotCanonical(_) => ErrorKind::NotCanonical,
            Self::IndexingIncomplete => ErrorKind::IndexingIncomplete,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Pool(_) => ErrorKind::Pool,
            Self::FeeOracle(_) => ErrorKind::FeeOracle,
        }
    }

    /// Returns `true` if repeating the request later may succeed without the caller changing
    /// it: the transaction index is catching up, or the block builder has no draft yet.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::IndexingIncomplete | Self::Unavailable(_))
    }
}
