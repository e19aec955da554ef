//! In-memory filter session and bloom-bits database.

use crate::{BloomRequest, MatcherSession};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use eth_backend_types::ProviderError;
use std::{
    collections::{BTreeMap, VecDeque},
    ops::Range,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SessionData {
    queue: VecDeque<u32>,
    unallocated: BTreeMap<u32, VecDeque<u64>>,
    allocated_batches: Vec<usize>,
    delivered: Vec<(u32, u64, Bytes)>,
    error: Option<ProviderError>,
}

/// A filter session with a fixed set of bloom bits and sections to fetch.
///
/// A bit is handed to one worker at a time; if sections are left after the worker claims its
/// batch, the bit goes to the back of the queue.
#[derive(Debug)]
pub struct TestMatcherSession {
    data: Mutex<SessionData>,
    cancel: CancellationToken,
}

impl TestMatcherSession {
    /// Creates a session fetching the given sections of each bit.
    pub fn new(bits: impl IntoIterator<Item = (u32, Range<u64>)>) -> Self {
        let mut data = SessionData::default();
        for (bit, sections) in bits {
            data.queue.push_back(bit);
            data.unallocated.insert(bit, sections.collect());
        }
        Self { data: Mutex::new(data), cancel: CancellationToken::new() }
    }

    fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns every delivered `(bit, section, bitset)`, in delivery order.
    pub fn delivered(&self) -> Vec<(u32, u64, Bytes)> {
        self.lock().delivered.clone()
    }

    /// Returns the size of every claimed batch, in claim order.
    pub fn requested_batches(&self) -> Vec<usize> {
        self.lock().allocated_batches.clone()
    }

    /// Returns the first retrieval error, if any.
    pub fn error(&self) -> Option<ProviderError> {
        self.lock().error.clone()
    }
}

#[async_trait]
impl MatcherSession for TestMatcherSession {
    async fn allocate_retrieval(&self) -> Option<u32> {
        self.lock().queue.pop_front()
    }

    fn pending_sections(&self, bit: u32) -> usize {
        self.lock().unallocated.get(&bit).map_or(0, VecDeque::len)
    }

    fn allocate_sections(&self, bit: u32, max: usize) -> Vec<u64> {
        let mut data = self.lock();
        let Some(unallocated) = data.unallocated.get_mut(&bit) else { return Vec::new() };
        let take = max.min(unallocated.len());
        let sections: Vec<u64> = unallocated.drain(..take).collect();
        let requeue = !unallocated.is_empty();
        if requeue {
            data.queue.push_back(bit);
        }
        if !sections.is_empty() {
            data.allocated_batches.push(sections.len());
        }
        sections
    }

    fn deliver_sections(&self, bit: u32, sections: Vec<u64>, bitsets: Vec<Bytes>) {
        let mut data = self.lock();
        data.delivered.extend(
            sections.into_iter().zip(bitsets).map(|(section, bitset)| (bit, section, bitset)),
        );
    }

    fn close_with_error(&self, error: ProviderError) {
        self.lock().error.get_or_insert(error);
        self.cancel.cancel();
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Answers bloom requests until the queue closes. The bitset of every section is
/// `[bit as u8, section as u8]`.
pub async fn serve_bloom_requests(requests: async_channel::Receiver<BloomRequest>) {
    while let Ok(request) = requests.recv().await {
        let mut retrieval = request.retrieval.clone();
        retrieval.bitsets = retrieval
            .sections
            .iter()
            .map(|section| Bytes::from(vec![retrieval.bit as u8, *section as u8]))
            .collect();
        request.respond(retrieval);
    }
}
