//! In-memory chain store.

use crate::{BlockReader, ChainEvents, ChainSpecReader, HeadWriter, HeaderReader, StateReader};
use alloy_consensus::{Header, ReceiptEnvelope, Sealed, TxEnvelope};
use alloy_eips::eip7840::BlobParams;
use alloy_primitives::{B256, Bytes, Log, keccak256};
use eth_backend_types::{
    Block, BlockBody, ChainEvent, ChainHeadEvent, MinedTransaction, PendingBlock, ProviderError,
    ProviderResult, RemovedLogsEvent, SealedBlock, SealedHeader, TransactionLocation,
    TransactionLookup, TxIndexProgress, seal_block,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;
const PENDING_FORK: u8 = 0xfe;

/// World state handed out by [`TestChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestState {
    /// The state root.
    pub root: B256,
    /// The number of the block that produced the state.
    pub number: u64,
}

#[derive(Debug, Default)]
struct ChainData {
    headers: HashMap<B256, SealedHeader>,
    bodies: HashMap<B256, BlockBody>,
    receipts: HashMap<B256, Vec<ReceiptEnvelope>>,
    logs: HashMap<B256, Vec<Vec<Log>>>,
    states: HashMap<B256, TestState>,
    canonical: BTreeMap<u64, B256>,
    tx_index: HashMap<B256, MinedTransaction>,
    head: B256,
    safe: Option<B256>,
    finalized: Option<B256>,
    index_remaining: u64,
    index_error: Option<ProviderError>,
    blob_params: Option<BlobParams>,
}

impl ChainData {
    fn head_header(&self) -> &SealedHeader {
        &self.headers[&self.head]
    }

    fn insert(&mut self, block: &SealedBlock) {
        let hash = block.hash();
        let header = Sealed::new_unchecked(block.header.clone(), hash);
        let tx_count = block.body.transactions.len();
        self.states.insert(
            header.state_root,
            TestState { root: header.state_root, number: header.number },
        );
        self.headers.insert(hash, header);
        self.bodies.insert(hash, block.body.clone());
        self.receipts.insert(hash, Vec::new());
        self.logs.insert(hash, vec![Vec::new(); tx_count]);
    }

    fn index(&mut self, header: &SealedHeader) {
        let Some(body) = self.bodies.get(&header.hash()) else { return };
        for (index, tx) in body.transactions.iter().enumerate() {
            let location = TransactionLocation {
                block_hash: header.hash(),
                block_number: header.number,
                index: index as u64,
            };
            self.tx_index
                .insert(*tx.tx_hash(), MinedTransaction { transaction: tx.clone(), location });
        }
    }

    fn unindex(&mut self, hash: B256) -> Vec<Log> {
        if let Some(body) = self.bodies.get(&hash) {
            for tx in &body.transactions {
                self.tx_index.remove(tx.tx_hash());
            }
        }
        self.logs.get(&hash).map(|logs| logs.concat()).unwrap_or_default()
    }

    /// Makes `head` the canonical head. Returns the newly canonical headers in ascending order
    /// and the logs of the blocks that left the canonical chain.
    fn canonicalize(&mut self, head: B256) -> (Vec<SealedHeader>, Vec<Log>) {
        let mut added = Vec::new();
        let mut cursor = self.headers.get(&head).cloned();
        while let Some(header) = cursor {
            if self.canonical.get(&header.number) == Some(&header.hash()) {
                break;
            }
            cursor = if header.number == 0 {
                None
            } else {
                self.headers.get(&header.parent_hash).cloned()
            };
            added.push(header);
        }
        added.reverse();

        let number = self.headers[&head].number;
        let mut dropped: Vec<B256> =
            self.canonical.split_off(&(number + 1)).into_values().collect();
        for header in &added {
            if let Some(old) = self.canonical.insert(header.number, header.hash()) {
                dropped.push(old);
            }
        }

        let removed_logs = dropped.into_iter().flat_map(|hash| self.unindex(hash)).collect();
        for header in &added {
            self.index(header);
        }
        self.head = head;
        (added, removed_logs)
    }
}

/// An in-memory chain store with a canonical chain, side branches, per-block state and event
/// feeds.
///
/// Blocks are linked by parent hash. Every block gets a distinct state root derived from its
/// parent and a branch tag, so sibling blocks on competing branches never share state.
#[derive(Debug)]
pub struct TestChain {
    chain_id: u64,
    data: RwLock<ChainData>,
    chain_events: broadcast::Sender<ChainEvent>,
    head_events: broadcast::Sender<ChainHeadEvent>,
    log_events: broadcast::Sender<Vec<Log>>,
    removed_log_events: broadcast::Sender<RemovedLogsEvent>,
}

impl TestChain {
    /// Creates a chain holding only its genesis block.
    pub fn new(chain_id: u64) -> Self {
        let genesis = seal_block(Block::new(
            Header {
                gas_limit: 30_000_000,
                state_root: keccak256(chain_id.to_be_bytes()),
                ..Default::default()
            },
            empty_body(Vec::new()),
        ));

        let mut data = ChainData::default();
        data.insert(&genesis);
        data.canonical.insert(0, genesis.hash());
        data.head = genesis.hash();

        Self {
            chain_id,
            data: RwLock::new(data),
            chain_events: broadcast::channel(EVENT_CAPACITY).0,
            head_events: broadcast::channel(EVENT_CAPACITY).0,
            log_events: broadcast::channel(EVENT_CAPACITY).0,
            removed_log_events: broadcast::channel(EVENT_CAPACITY).0,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds, without inserting, a child of `parent` tagged with `fork`.
    pub fn build_block(
        &self,
        parent: &SealedHeader,
        transactions: Vec<TxEnvelope>,
        fork: u8,
    ) -> SealedBlock {
        let state_root = keccak256([parent.hash().as_slice(), &[fork][..]].concat());
        seal_block(Block::new(
            Header {
                parent_hash: parent.hash(),
                number: parent.number + 1,
                timestamp: parent.timestamp + 12,
                gas_limit: parent.gas_limit,
                state_root,
                extra_data: Bytes::from(vec![fork]),
                ..Default::default()
            },
            empty_body(transactions),
        ))
    }

    /// Inserts a block without changing the canonical chain.
    pub fn insert_block(&self, block: &SealedBlock) {
        self.write().insert(block);
    }

    /// Makes the block with the given hash the canonical head, rewriting the canonical chain
    /// back to the common ancestor and publishing the matching events.
    pub fn set_canonical_head(&self, head: B256) {
        let (added, removed_logs) = self.write().canonicalize(head);
        self.publish(added, removed_logs);
    }

    fn publish(&self, added: Vec<SealedHeader>, removed_logs: Vec<Log>) {
        if !removed_logs.is_empty() {
            let _ = self.removed_log_events.send(RemovedLogsEvent { logs: removed_logs });
        }
        let logs: Vec<_> = {
            let data = self.read();
            added.iter().map(|header| data.logs.get(&header.hash()).cloned()).collect()
        };
        for (header, logs) in added.iter().zip(logs) {
            let _ = self.chain_events.send(ChainEvent { header: header.clone() });
            let logs: Vec<Log> = logs.map(|logs| logs.concat()).unwrap_or_default();
            if !logs.is_empty() {
                let _ = self.log_events.send(logs);
            }
        }
        if let Some(head) = added.last() {
            let _ = self.head_events.send(ChainHeadEvent { header: head.clone() });
        }
    }

    fn append(&self, transactions: Vec<TxEnvelope>, excess_blob_gas: Option<u64>) -> SealedHeader {
        let head = self.current_block();
        let block = self.build_block(&head, transactions, 0);
        let block = match excess_blob_gas {
            Some(excess) => {
                let mut block = block.into_inner();
                block.header.excess_blob_gas = Some(excess);
                block.header.blob_gas_used = Some(0);
                seal_block(block)
            }
            None => block,
        };
        self.insert_block(&block);
        self.set_canonical_head(block.hash());
        Sealed::new_unchecked(block.header.clone(), block.hash())
    }

    /// Appends `count` empty blocks to the canonical chain.
    pub fn extend(&self, count: u64) -> Vec<SealedHeader> {
        (0..count).map(|_| self.append(Vec::new(), None)).collect()
    }

    /// Appends a block with the given transactions to the canonical chain.
    pub fn mine(&self, transactions: Vec<TxEnvelope>) -> SealedHeader {
        self.append(transactions, None)
    }

    /// Appends an empty block carrying `excess_blob_gas` to the canonical chain.
    pub fn mine_with_excess_blob_gas(&self, excess_blob_gas: u64) -> SealedHeader {
        self.append(Vec::new(), Some(excess_blob_gas))
    }

    /// Replaces every canonical block above `fork_point` with `count` new blocks tagged with
    /// `fork`, and returns the new branch.
    pub fn reorg(&self, fork_point: u64, count: u64, fork: u8) -> Vec<SealedHeader> {
        let mut parent = self.canonical_header(fork_point);
        let mut branch = Vec::new();
        for _ in 0..count {
            let block = self.build_block(&parent, Vec::new(), fork);
            self.insert_block(&block);
            parent = Sealed::new_unchecked(block.header.clone(), block.hash());
            branch.push(parent.clone());
        }
        self.set_canonical_head(parent.hash());
        branch
    }

    /// Builds a pending draft on top of the current head. The draft is not inserted.
    pub fn build_pending(&self, transactions: Vec<TxEnvelope>) -> PendingBlock<TestState> {
        let block = self.build_block(&self.current_block(), transactions, PENDING_FORK);
        let state = TestState { root: block.header.state_root, number: block.header.number };
        PendingBlock::new(block, Vec::new(), state)
    }

    /// Returns the canonical header at `number`.
    ///
    /// # Panics
    ///
    /// Panics if there is no canonical block at `number`.
    pub fn canonical_header(&self, number: u64) -> SealedHeader {
        let data = self.read();
        let hash = data.canonical.get(&number).expect("no canonical block at number");
        data.headers[hash].clone()
    }

    /// Marks the canonical block at `number` as safe.
    pub fn set_safe(&self, number: u64) {
        let hash = self.canonical_header(number).hash();
        self.write().safe = Some(hash);
    }

    /// Marks the canonical block at `number` as finalized.
    pub fn set_finalized(&self, number: u64) {
        let hash = self.canonical_header(number).hash();
        self.write().finalized = Some(hash);
    }

    /// Drops the body of a block, keeping its header.
    pub fn remove_body(&self, hash: B256) {
        self.write().bodies.remove(&hash);
    }

    /// Drops the state with the given root.
    pub fn prune_state(&self, root: B256) {
        self.write().states.remove(&root);
    }

    /// Replaces the logs of a block.
    pub fn insert_logs(&self, hash: B256, logs: Vec<Vec<Log>>) {
        self.write().logs.insert(hash, logs);
    }

    /// Replaces the receipts stored for a block.
    pub fn insert_receipts(&self, hash: B256, receipts: Vec<ReceiptEnvelope>) {
        self.write().receipts.insert(hash, receipts);
    }

    /// Sets the number of blocks the transaction indexer still has to process.
    pub fn set_index_remaining(&self, remaining: u64) {
        self.write().index_remaining = remaining;
    }

    /// Makes reading the transaction indexer's progress fail.
    pub fn fail_index_progress(&self, error: ProviderError) {
        self.write().index_error = Some(error);
    }

    /// Sets the blob fee parameters, active at every timestamp.
    pub fn set_blob_params(&self, params: Option<BlobParams>) {
        self.write().blob_params = params;
    }
}

fn empty_body(transactions: Vec<TxEnvelope>) -> BlockBody {
    BlockBody { transactions, ommers: Vec::new(), withdrawals: None }
}

impl ChainSpecReader for TestChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn blob_params_at_timestamp(&self, _timestamp: u64) -> Option<BlobParams> {
        self.read().blob_params
    }
}

impl HeaderReader for TestChain {
    fn current_header(&self) -> SealedHeader {
        self.read().head_header().clone()
    }

    fn current_block(&self) -> SealedHeader {
        self.read().head_header().clone()
    }

    fn current_safe_header(&self) -> Option<SealedHeader> {
        let data = self.read();
        data.safe.and_then(|hash| data.headers.get(&hash).cloned())
    }

    fn current_finalized_header(&self) -> Option<SealedHeader> {
        let data = self.read();
        data.finalized.and_then(|hash| data.headers.get(&hash).cloned())
    }

    fn header_by_hash(&self, hash: B256) -> ProviderResult<Option<SealedHeader>> {
        Ok(self.read().headers.get(&hash).cloned())
    }

    fn header_by_number(&self, number: u64) -> ProviderResult<Option<SealedHeader>> {
        let data = self.read();
        Ok(data.canonical.get(&number).and_then(|hash| data.headers.get(hash).cloned()))
    }

    fn canonical_hash(&self, number: u64) -> ProviderResult<Option<B256>> {
        Ok(self.read().canonical.get(&number).copied())
    }
}

impl BlockReader for TestChain {
    fn block(&self, hash: B256, number: u64) -> ProviderResult<Option<SealedBlock>> {
        let data = self.read();
        let Some(header) = data.headers.get(&hash).filter(|header| header.number == number) else {
            return Ok(None);
        };
        Ok(data.bodies.get(&hash).map(|body| {
            Sealed::new_unchecked(Block::new(header.inner().clone(), body.clone()), hash)
        }))
    }

    fn body(&self, hash: B256) -> ProviderResult<Option<BlockBody>> {
        Ok(self.read().bodies.get(&hash).cloned())
    }

    fn receipts_by_hash(&self, hash: B256) -> ProviderResult<Option<Vec<ReceiptEnvelope>>> {
        Ok(self.read().receipts.get(&hash).cloned())
    }

    fn logs(&self, hash: B256, _number: u64) -> ProviderResult<Option<Vec<Vec<Log>>>> {
        Ok(self.read().logs.get(&hash).cloned())
    }

    fn transaction_lookup(&self, hash: B256) -> ProviderResult<TransactionLookup> {
        let data = self.read();
        Ok(match data.tx_index.get(&hash) {
            Some(mined) => TransactionLookup::Found(mined.clone()),
            None if data.index_remaining > 0 => TransactionLookup::Indexing,
            None => TransactionLookup::NotFound,
        })
    }

    fn tx_index_progress(&self) -> ProviderResult<TxIndexProgress> {
        let data = self.read();
        if let Some(err) = &data.index_error {
            return Err(err.clone());
        }
        Ok(TxIndexProgress {
            indexed: data.head_header().number + 1,
            remaining: data.index_remaining,
        })
    }
}

impl StateReader for TestChain {
    type State = TestState;

    fn state_at(&self, root: B256) -> ProviderResult<TestState> {
        self.read().states.get(&root).cloned().ok_or(ProviderError::StateNotAvailable(root))
    }
}

impl ChainEvents for TestChain {
    fn subscribe_chain_events(&self) -> broadcast::Receiver<ChainEvent> {
        self.chain_events.subscribe()
    }

    fn subscribe_chain_head_events(&self) -> broadcast::Receiver<ChainHeadEvent> {
        self.head_events.subscribe()
    }

    fn subscribe_logs(&self) -> broadcast::Receiver<Vec<Log>> {
        self.log_events.subscribe()
    }

    fn subscribe_removed_logs(&self) -> broadcast::Receiver<RemovedLogsEvent> {
        self.removed_log_events.subscribe()
    }
}

impl HeadWriter for TestChain {
    fn set_head(&self, number: u64) -> ProviderResult<()> {
        let (head, removed_logs) = {
            let mut data = self.write();
            let Some(hash) = data.canonical.get(&number).copied() else {
                return Err(ProviderError::SetHead(number));
            };
            let dropped: Vec<B256> =
                data.canonical.split_off(&(number + 1)).into_values().collect();
            let removed_logs: Vec<Log> =
                dropped.into_iter().flat_map(|hash| data.unindex(hash)).collect();
            data.head = hash;
            (data.head_header().clone(), removed_logs)
        };

        if !removed_logs.is_empty() {
            let _ = self.removed_log_events.send(RemovedLogsEvent { logs: removed_logs });
        }
        let _ = self.head_events.send(ChainHeadEvent { header: head });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_log, test_transaction};

    #[test]
    fn test_reorg_rewrites_canonical_chain() {
        let chain = TestChain::new(1);
        let old = chain.extend(4);
        let branch = chain.reorg(2, 3, 1);

        assert_eq!(chain.current_block().number, 5);
        assert_eq!(chain.canonical_hash(3).unwrap(), Some(branch[0].hash()));
        assert_ne!(branch[0].hash(), old[2].hash());
        assert_ne!(branch[0].state_root, old[2].state_root);
        assert_eq!(chain.header_by_hash(old[2].hash()).unwrap(), Some(old[2].clone()));
    }

    #[test]
    fn test_reorg_moves_transaction_index_and_logs() {
        let chain = TestChain::new(1);
        chain.extend(2);
        let tx = test_transaction(0);
        let mined = chain.mine(vec![tx.clone()]);
        chain.insert_logs(mined.hash(), vec![vec![test_log(3)]]);
        let mut removed = chain.subscribe_removed_logs();

        chain.reorg(2, 2, 1);

        assert_eq!(chain.transaction_lookup(*tx.tx_hash()).unwrap(), TransactionLookup::NotFound);
        assert_eq!(removed.try_recv().unwrap().logs, vec![test_log(3)]);
    }

    #[test]
    fn test_block_requires_matching_number() {
        let chain = TestChain::new(1);
        let header = chain.extend(1).remove(0);
        assert!(chain.block(header.hash(), 1).unwrap().is_some());
        assert!(chain.block(header.hash(), 2).unwrap().is_none());
    }
}
