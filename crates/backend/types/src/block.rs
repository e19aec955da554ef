//! Block and header aliases, and the pending block value.

use alloy_consensus::{Header, ReceiptEnvelope, Sealed, TxEnvelope};

/// A header carried together with its hash.
pub type SealedHeader = Sealed<Header>;

/// A full block: header plus body.
pub type Block = alloy_consensus::Block<TxEnvelope>;

/// The body of a [`Block`].
pub type BlockBody = alloy_consensus::BlockBody<TxEnvelope>;

/// A block carried together with its hash.
pub type SealedBlock = Sealed<Block>;

/// Seals a block by hashing its header.
pub fn seal_block(block: Block) -> SealedBlock {
    let hash = block.header.hash_slow();
    Sealed::new_unchecked(block, hash)
}

/// The block most recently assembled by the block builder, together with the receipts and
/// post-state it was produced with.
///
/// The three parts are produced as one unit. A consumer asking for the pending state must take
/// it from the same value as the pending block, since the builder may replace its draft between
/// two calls.
#[derive(Debug, Clone)]
pub struct PendingBlock<S> {
    /// The pending block.
    pub block: SealedBlock,
    /// The receipts of the pending block's transactions.
    pub receipts: Vec<ReceiptEnvelope>,
    /// The state after executing the pending block.
    pub state: S,
}

impl<S> PendingBlock<S> {
    /// Creates a new [`PendingBlock`].
    pub const fn new(block: SealedBlock, receipts: Vec<ReceiptEnvelope>, state: S) -> Self {
        Self { block, receipts, state }
    }

    /// Returns the sealed header of the pending block.
    pub fn header(&self) -> SealedHeader {
        Sealed::new_unchecked(self.block.header.clone(), self.block.hash())
    }
}
