//! Resolution of chain references into headers, blocks and state.

use crate::{
    BackendError, BackendResult, BackendTypes, BlockReader, EthBackend, HeaderReader, Metrics,
    NotFoundError, PendingBlockProvider, StateOf, StateReader, UnavailableError,
};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::B256;
use eth_backend_types::{
    BlockBody, ChainRef, ChainRefError, PendingBlock, SealedBlock, SealedHeader,
};

impl<N: BackendTypes> EthBackend<N> {
    /// Returns the header the reference points at.
    ///
    /// A concrete number with no canonical block resolves to `Ok(None)`. Every other miss is an
    /// error, since the caller asked for something that should exist.
    pub fn header_by_ref(&self, reference: ChainRef) -> BackendResult<Option<SealedHeader>> {
        self.resolve_header(reference).inspect_err(Metrics::record_resolve_error)
    }

    /// Returns the header for a block number or tag.
    pub fn header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> BackendResult<Option<SealedHeader>> {
        self.header_by_ref(number.into())
    }

    /// Returns the header with the given hash, canonical or not.
    pub fn header_by_hash(&self, hash: B256) -> BackendResult<Option<SealedHeader>> {
        Ok(self.chain().header_by_hash(hash)?)
    }

    /// Returns the full block the reference points at.
    ///
    /// Fails with [`NotFoundError::BlockBodyMissing`] when the header resolves but the chain
    /// store has no body for it.
    pub fn block_by_ref(&self, reference: ChainRef) -> BackendResult<Option<SealedBlock>> {
        self.resolve_block(reference).inspect_err(Metrics::record_resolve_error)
    }

    /// Returns the full block for a block number or tag.
    pub fn block_by_number(&self, number: BlockNumberOrTag) -> BackendResult<Option<SealedBlock>> {
        self.block_by_ref(number.into())
    }

    /// Returns the full block with the given hash, canonical or not.
    pub fn block_by_hash(&self, hash: B256) -> BackendResult<Option<SealedBlock>> {
        let Some(header) = self.chain().header_by_hash(hash)? else {
            return Ok(None);
        };
        Ok(self.chain().block(hash, header.number)?)
    }

    /// Returns the body of the block with the given hash.
    ///
    /// The number must be concrete and the hash non-zero.
    pub fn body(&self, hash: B256, number: BlockNumberOrTag) -> BackendResult<BlockBody> {
        if !number.is_number() || hash.is_zero() {
            return Err(ChainRefError::ConcreteBlockRequired.into());
        }
        let body = self.chain().body(hash)?.ok_or(NotFoundError::BlockBody(hash))?;
        Ok(body)
    }

    /// Returns the state and header the reference points at.
    ///
    /// Unlike [`EthBackend::header_by_ref`], a concrete number with no canonical block fails
    /// with [`NotFoundError::Header`], since there is no state to hand out.
    pub fn state_and_header_by_ref(
        &self,
        reference: ChainRef,
    ) -> BackendResult<(StateOf<N>, SealedHeader)> {
        self.resolve_state(reference).inspect_err(Metrics::record_resolve_error)
    }

    /// Returns the state and header for a block number or tag.
    pub fn state_and_header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> BackendResult<(StateOf<N>, SealedHeader)> {
        self.state_and_header_by_ref(number.into())
    }

    /// Returns the block builder's current draft with its receipts and post-state.
    pub fn pending(&self) -> Option<PendingBlock<StateOf<N>>> {
        self.miner().pending()
    }

    /// Returns the header the header chain has advanced to.
    pub fn current_header(&self) -> SealedHeader {
        self.chain().current_header()
    }

    /// Returns the header of the canonical head block.
    pub fn current_block(&self) -> SealedHeader {
        self.chain().current_block()
    }

    fn resolve_header(&self, reference: ChainRef) -> BackendResult<Option<SealedHeader>> {
        let chain = self.chain();
        match reference {
            ChainRef::Pending => {
                let pending = self.miner().pending().ok_or(UnavailableError::PendingBlock)?;
                Ok(Some(pending.header()))
            }
            ChainRef::Latest => Ok(Some(chain.current_block())),
            ChainRef::Finalized => {
                let header =
                    chain.current_finalized_header().ok_or(NotFoundError::FinalizedBlock)?;
                Ok(Some(header))
            }
            ChainRef::Safe => {
                let header = chain.current_safe_header().ok_or(NotFoundError::SafeBlock)?;
                Ok(Some(header))
            }
            ChainRef::Number(number) => Ok(chain.header_by_number(number)?),
            ChainRef::Hash { hash, require_canonical } => {
                self.header_by_hash_checked(hash, require_canonical).map(Some)
            }
        }
    }

    fn resolve_block(&self, reference: ChainRef) -> BackendResult<Option<SealedBlock>> {
        if reference.is_pending() {
            let pending = self.miner().pending().ok_or(UnavailableError::PendingBlock)?;
            return Ok(Some(pending.block));
        }

        let Some(header) = self.resolve_header(reference)? else {
            return Ok(None);
        };
        self.block_for_header(&header).map(Some)
    }

    fn resolve_state(&self, reference: ChainRef) -> BackendResult<(StateOf<N>, SealedHeader)> {
        let header = match reference {
            ChainRef::Pending => {
                let pending = self.miner().pending().ok_or(UnavailableError::PendingState)?;
                let header = pending.header();
                return Ok((pending.state, header));
            }
            ChainRef::Hash { hash, require_canonical } => {
                self.header_by_hash_checked(hash, require_canonical)?
            }
            reference => self.resolve_header(reference)?.ok_or(NotFoundError::Header)?,
        };

        let state = self.chain().state_at(header.state_root).inspect_err(|err| {
            debug!(
                target: "eth_backend",
                number = header.number,
                root = %header.state_root,
                %err,
                "State not available for resolved header"
            );
        })?;
        Ok((state, header))
    }

    fn header_by_hash_checked(
        &self,
        hash: B256,
        require_canonical: bool,
    ) -> BackendResult<SealedHeader> {
        let header = self.chain().header_by_hash(hash)?.ok_or(NotFoundError::HeaderForHash(hash))?;
        if require_canonical {
            self.ensure_canonical(&header)?;
        }
        Ok(header)
    }

    fn ensure_canonical(&self, header: &SealedHeader) -> BackendResult<()> {
        let canonical = self.chain().canonical_hash(header.number)?;
        if canonical != Some(header.hash()) {
            debug!(
                target: "eth_backend",
                hash = %header.hash(),
                number = header.number,
                ?canonical,
                "Block is not on the canonical chain"
            );
            return Err(BackendError::NotCanonical(header.hash()));
        }
        Ok(())
    }

    fn block_for_header(&self, header: &SealedHeader) -> BackendResult<SealedBlock> {
        self.chain().block(header.hash(), header.number)?.ok_or_else(|| {
            warn!(
                target: "eth_backend",
                hash = %header.hash(),
                number = header.number,
                "Header found, but block body is missing"
            );
            NotFoundError::BlockBodyMissing(header.hash()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        BackendError, ChainRef, NotFoundError, UnavailableError,
        test_utils::{TestHarness, test_transaction},
    };
    use alloy_eips::BlockNumberOrTag;
    use alloy_primitives::B256;
    use eth_backend_types::{ChainRefError, ProviderError};
    use rstest::rstest;

    #[test]
    fn test_latest_is_current_block() {
        let harness = TestHarness::new(5);
        let header = harness.backend.header_by_ref(ChainRef::Latest).unwrap().unwrap();
        assert_eq!(header.number, 5);
        assert_eq!(header.hash(), harness.chain.canonical_header(5).hash());
    }

    #[test]
    fn test_number_miss_is_not_an_error() {
        let harness = TestHarness::new(5);
        assert_eq!(harness.backend.header_by_ref(ChainRef::Number(1_000)).unwrap(), None);
        assert_eq!(harness.backend.block_by_ref(ChainRef::Number(1_000)).unwrap(), None);
    }

    #[test]
    fn test_hash_miss_is_an_error() {
        let harness = TestHarness::new(5);
        let hash = B256::repeat_byte(0xab);
        let err = harness.backend.header_by_ref(ChainRef::hash(hash)).unwrap_err();
        assert_eq!(err, NotFoundError::HeaderForHash(hash).into());
        assert_eq!(err.to_string(), "header for hash not found");
    }

    #[rstest]
    #[case::safe(ChainRef::Safe, NotFoundError::SafeBlock)]
    #[case::finalized(ChainRef::Finalized, NotFoundError::FinalizedBlock)]
    fn test_unset_safety_labels(#[case] reference: ChainRef, #[case] expected: NotFoundError) {
        let harness = TestHarness::new(5);
        assert_eq!(harness.backend.header_by_ref(reference).unwrap_err(), expected.into());
        assert_eq!(harness.backend.block_by_ref(reference).unwrap_err(), expected.into());
    }

    #[test]
    fn test_safety_labels_resolve_once_set() {
        let harness = TestHarness::new(5);
        harness.chain.set_safe(4);
        harness.chain.set_finalized(2);

        let safe = harness.backend.header_by_ref(ChainRef::Safe).unwrap().unwrap();
        let finalized = harness.backend.block_by_ref(ChainRef::Finalized).unwrap().unwrap();
        assert_eq!(safe.number, 4);
        assert_eq!(finalized.header.number, 2);
    }

    #[test]
    fn test_pending_without_draft() {
        let harness = TestHarness::new(3);
        let backend = &harness.backend;

        assert_eq!(
            backend.header_by_ref(ChainRef::Pending).unwrap_err(),
            UnavailableError::PendingBlock.into()
        );
        assert_eq!(
            backend.block_by_ref(ChainRef::Pending).unwrap_err(),
            UnavailableError::PendingBlock.into()
        );
        assert_eq!(
            backend.state_and_header_by_ref(ChainRef::Pending).unwrap_err(),
            UnavailableError::PendingState.into()
        );
        assert!(backend.pending().is_none());
    }

    #[test]
    fn test_pending_parts_come_from_one_draft() {
        let harness = TestHarness::new(3);
        let draft = harness.chain.build_pending(vec![test_transaction(0)]);
        harness.miner.set_pending(draft.clone());

        let header = harness.backend.header_by_ref(ChainRef::Pending).unwrap().unwrap();
        let block = harness.backend.block_by_ref(ChainRef::Pending).unwrap().unwrap();
        let (state, state_header) =
            harness.backend.state_and_header_by_ref(ChainRef::Pending).unwrap();

        assert_eq!(header.number, 4);
        assert_eq!(header.hash(), draft.block.hash());
        assert_eq!(block.hash(), draft.block.hash());
        assert_eq!(state_header.hash(), draft.block.hash());
        assert_eq!(state, draft.state);
    }

    #[test]
    fn test_pending_draft_is_not_in_chain_store() {
        let harness = TestHarness::new(3);
        let draft = harness.chain.build_pending(Vec::new());
        harness.miner.set_pending(draft.clone());

        assert_eq!(harness.backend.header_by_hash(draft.block.hash()).unwrap(), None);
        assert_eq!(harness.backend.header_by_ref(ChainRef::Latest).unwrap().unwrap().number, 3);
    }

    #[test]
    fn test_missing_body_for_resolved_header() {
        let harness = TestHarness::new(5);
        let header = harness.chain.canonical_header(3);
        harness.chain.remove_body(header.hash());

        let expected: BackendError = NotFoundError::BlockBodyMissing(header.hash()).into();
        assert_eq!(harness.backend.block_by_ref(ChainRef::Number(3)).unwrap_err(), expected);
        assert_eq!(
            harness.backend.block_by_ref(ChainRef::hash(header.hash())).unwrap_err(),
            expected
        );
        assert_eq!(expected.to_string(), "header found, but block body is missing");

        // The header itself still resolves.
        assert!(harness.backend.header_by_ref(ChainRef::Number(3)).unwrap().is_some());
        // Plain hash lookups pass the miss through.
        assert_eq!(harness.backend.block_by_hash(header.hash()).unwrap(), None);
    }

    #[test]
    fn test_body_requires_concrete_block() {
        let harness = TestHarness::new(3);
        let header = harness.chain.canonical_header(2);

        let err = harness.backend.body(header.hash(), BlockNumberOrTag::Latest).unwrap_err();
        assert_eq!(err, ChainRefError::ConcreteBlockRequired.into());
        assert_eq!(err.to_string(), "invalid arguments; expect hash and no special block numbers");

        let err = harness.backend.body(B256::ZERO, BlockNumberOrTag::Number(2)).unwrap_err();
        assert_eq!(err, ChainRefError::ConcreteBlockRequired.into());
    }

    #[test]
    fn test_body_lookup() {
        let harness = TestHarness::new(3);
        let header = harness.chain.canonical_header(2);

        let body = harness.backend.body(header.hash(), BlockNumberOrTag::Number(2)).unwrap();
        assert!(body.transactions.is_empty());

        let missing = B256::repeat_byte(0x11);
        assert_eq!(
            harness.backend.body(missing, BlockNumberOrTag::Number(2)).unwrap_err(),
            NotFoundError::BlockBody(missing).into()
        );
    }

    #[test]
    fn test_state_number_miss_is_an_error() {
        let harness = TestHarness::new(3);
        let err = harness.backend.state_and_header_by_ref(ChainRef::Number(99)).unwrap_err();
        assert_eq!(err, NotFoundError::Header.into());
        assert_eq!(err.to_string(), "header not found");
    }

    #[test]
    fn test_state_for_resolved_header() {
        let harness = TestHarness::new(3);
        let (state, header) =
            harness.backend.state_and_header_by_number(BlockNumberOrTag::Number(2)).unwrap();
        assert_eq!(header.number, 2);
        assert_eq!(state.root, header.state_root);
    }

    #[test]
    fn test_pruned_state_passes_provider_error_through() {
        let harness = TestHarness::new(3);
        let header = harness.chain.canonical_header(1);
        harness.chain.prune_state(header.state_root);

        let err = harness.backend.state_and_header_by_ref(ChainRef::Number(1)).unwrap_err();
        assert_eq!(err, ProviderError::StateNotAvailable(header.state_root).into());
    }

    #[test]
    fn test_state_by_hash_uses_hash_rules() {
        let harness = TestHarness::new(3);
        let hash = B256::repeat_byte(0x42);
        let err = harness.backend.state_and_header_by_ref(ChainRef::hash(hash)).unwrap_err();
        assert_eq!(err, NotFoundError::HeaderForHash(hash).into());
    }
}
