//! Bloom-bit retrieval for log filter sessions.
//!
//! A log filter matches blocks against the bloom-bits index section by section. Each filter
//! session hands out bloom bits still to be fetched; a small pool of workers claims them,
//! batches their sections, and queues [`BloomRequest`]s for the bloom-bits database to answer.

use crate::{BackendTypes, BloomIndexer, EthBackend, Metrics};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use eth_backend_types::ProviderError;
use std::{fmt::Debug, num::NonZeroUsize, sync::Arc, time::Duration};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Number of blocks covered by one section of the bloom-bits index.
pub const BLOOM_BITS_BLOCKS: u64 = 4096;

/// Default number of retrieval workers per filter session.
pub const DEFAULT_BLOOM_FILTER_THREADS: NonZeroUsize = NonZeroUsize::new(3).unwrap();

/// Default maximum number of sections fetched per request.
pub const DEFAULT_BLOOM_RETRIEVAL_BATCH: NonZeroUsize = NonZeroUsize::new(16).unwrap();

/// Default time a worker waits for a batch to fill.
pub const DEFAULT_BLOOM_RETRIEVAL_WAIT: Duration = Duration::ZERO;

/// The bloom-bit vectors of one bit across a batch of sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomRetrieval {
    /// The bloom bit.
    pub bit: u32,
    /// The sections to fetch.
    pub sections: Vec<u64>,
    /// The fetched bit vectors, one per section. Empty until answered.
    pub bitsets: Vec<Bytes>,
    /// Set if the retrieval failed.
    pub error: Option<ProviderError>,
}

impl BloomRetrieval {
    /// Creates an unanswered retrieval.
    pub const fn new(bit: u32, sections: Vec<u64>) -> Self {
        Self { bit, sections, bitsets: Vec::new(), error: None }
    }
}

/// A retrieval queued for the bloom-bits database, answered through `reply`.
#[derive(Debug)]
pub struct BloomRequest {
    /// The retrieval to answer.
    pub retrieval: BloomRetrieval,
    /// Where to send the answered retrieval.
    pub reply: oneshot::Sender<BloomRetrieval>,
}

impl BloomRequest {
    /// Answers the request. The requesting worker may have gone away, in which case the answer
    /// is dropped.
    pub fn respond(self, retrieval: BloomRetrieval) {
        let _ = self.reply.send(retrieval);
    }
}

/// A running log filter that needs bloom bits fetched.
#[async_trait]
pub trait MatcherSession: Debug + Send + Sync + 'static {
    /// Waits for a bloom bit with sections left to fetch. Returns `None` once the session needs
    /// nothing more.
    async fn allocate_retrieval(&self) -> Option<u32>;

    /// Returns the number of sections of `bit` still waiting to be fetched.
    fn pending_sections(&self, bit: u32) -> usize;

    /// Claims up to `max` sections of `bit` for fetching.
    fn allocate_sections(&self, bit: u32, max: usize) -> Vec<u64>;

    /// Hands fetched bit vectors back to the session. A section delivered with an empty vector
    /// was not fetched.
    fn deliver_sections(&self, bit: u32, sections: Vec<u64>, bitsets: Vec<Bytes>);

    /// Records a retrieval failure and shuts the session down.
    fn close_with_error(&self, error: ProviderError);

    /// Returns a token that is cancelled when the session shuts down.
    fn cancellation(&self) -> CancellationToken;
}

impl<N: BackendTypes> EthBackend<N> {
    /// Returns the section size of the bloom-bits index and the number of indexed sections.
    pub fn bloom_status(&self) -> (u64, u64) {
        (BLOOM_BITS_BLOCKS, self.bloom_indexer().sections())
    }

    /// Starts the retrieval workers for a filter session.
    ///
    /// The workers are detached: they run until the session needs nothing more or is
    /// cancelled, whether or not the returned handles are kept. Must be called from within a
    /// Tokio runtime.
    pub fn service_filter<S: MatcherSession>(&self, session: Arc<S>) -> Vec<JoinHandle<()>> {
        let config = self.config().bloom;
        (0..config.filter_threads.get())
            .map(|_| {
                tokio::spawn(multiplex(
                    Arc::clone(&session),
                    config.retrieval_batch.get(),
                    config.retrieval_wait,
                    self.bloom_requests().clone(),
                ))
            })
            .collect()
    }
}

/// Runs one retrieval worker for `session`.
async fn multiplex<S: MatcherSession>(
    session: Arc<S>,
    batch: usize,
    wait: Duration,
    requests: async_channel::Sender<BloomRequest>,
) {
    Metrics::bloom_worker_started();
    serve_session(session.as_ref(), batch, wait, &requests).await;
    Metrics::bloom_worker_stopped();
}

async fn serve_session<S: MatcherSession>(
    session: &S,
    batch: usize,
    wait: Duration,
    requests: &async_channel::Sender<BloomRequest>,
) {
    let cancel = session.cancellation();
    loop {
        let bit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            bit = session.allocate_retrieval() => match bit {
                Some(bit) => bit,
                None => return,
            },
        };

        // Give a thin batch a chance to fill up.
        if session.pending_sections(bit) < batch {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    session.deliver_sections(bit, Vec::new(), Vec::new());
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        let sections = session.allocate_sections(bit, batch);
        let (reply, response) = oneshot::channel();
        let request = BloomRequest { retrieval: BloomRetrieval::new(bit, sections.clone()), reply };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = requests.send(request) => sent.is_ok(),
        };
        if !sent {
            let unfetched = vec![Bytes::new(); sections.len()];
            session.deliver_sections(bit, sections, unfetched);
            if !cancel.is_cancelled() {
                warn!(target: "eth_backend::bloom", bit, "Bloom request queue closed");
                session.close_with_error(ProviderError::Database(
                    "bloom request queue closed".to_string(),
                ));
            }
            return;
        }

        // Accepted requests are always answered or dropped; deliver before closing.
        match response.await {
            Ok(retrieval) => {
                session.deliver_sections(retrieval.bit, retrieval.sections, retrieval.bitsets);
                if let Some(err) = retrieval.error {
                    warn!(target: "eth_backend::bloom", bit, %err, "Bloom retrieval failed");
                    session.close_with_error(err);
                }
            }
            Err(_) => {
                let unfetched = vec![Bytes::new(); sections.len()];
                session.deliver_sections(bit, sections, unfetched);
                warn!(target: "eth_backend::bloom", bit, "Bloom request dropped unanswered");
                session.close_with_error(ProviderError::Database(
                    "bloom request dropped unanswered".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BackendConfig, BloomConfig,
        test_utils::{TestHarness, TestMatcherSession, serve_bloom_requests},
    };
    use std::collections::BTreeSet;

    #[test]
    fn test_bloom_status() {
        let harness = TestHarness::new(1);
        harness.bloom_indexer.set_sections(12);
        assert_eq!(harness.backend.bloom_status(), (4096, 12));
    }

    #[tokio::test]
    async fn test_service_filter_fetches_every_section_once() {
        let harness = TestHarness::new(1);
        let session = Arc::new(TestMatcherSession::new([(0, 0..40), (7, 0..5), (2047, 10..30)]));
        let server = tokio::spawn(serve_bloom_requests(harness.bloom_requests.clone()));

        let workers = harness.backend.service_filter(Arc::clone(&session));
        assert_eq!(workers.len(), 3);
        for worker in workers {
            worker.await.unwrap();
        }

        let delivered = session.delivered();
        let mut seen = BTreeSet::new();
        for (bit, section, bitset) in &delivered {
            assert!(seen.insert((*bit, *section)), "section delivered twice");
            assert_eq!(bitset, &Bytes::from(vec![*bit as u8, *section as u8]));
        }
        assert_eq!(seen.len(), 40 + 5 + 20);
        assert!(session.requested_batches().iter().all(|len| *len <= 16));
        assert_eq!(session.error(), None);

        server.abort();
    }

    #[tokio::test]
    async fn test_service_filter_honours_configured_workers() {
        let config = BackendConfig {
            bloom: BloomConfig {
                filter_threads: NonZeroUsize::new(1).unwrap(),
                retrieval_batch: NonZeroUsize::new(4).unwrap(),
                ..Default::default()
            },
            ..Default::default()
        };
        let harness = TestHarness::with_config(1, config);
        let session = Arc::new(TestMatcherSession::new([(3, 0..10)]));
        let server = tokio::spawn(serve_bloom_requests(harness.bloom_requests.clone()));

        let workers = harness.backend.service_filter(Arc::clone(&session));
        assert_eq!(workers.len(), 1);
        for worker in workers {
            worker.await.unwrap();
        }

        assert_eq!(session.requested_batches(), vec![4, 4, 2]);
        server.abort();
    }

    #[tokio::test]
    async fn test_failed_retrieval_closes_session() {
        let harness = TestHarness::new(1);
        let session = Arc::new(TestMatcherSession::new([(1, 0..64)]));
        let requests = harness.bloom_requests.clone();
        let server = tokio::spawn(async move {
            while let Ok(request) = requests.recv().await {
                let mut retrieval = request.retrieval.clone();
                retrieval.error = Some(ProviderError::Database("bloom table corrupt".into()));
                request.respond(retrieval);
            }
        });

        for worker in harness.backend.service_filter(Arc::clone(&session)) {
            worker.await.unwrap();
        }

        assert_eq!(session.error(), Some(ProviderError::Database("bloom table corrupt".into())));
        assert!(session.cancellation().is_cancelled());
        server.abort();
    }

    #[tokio::test]
    async fn test_workers_outlive_dropped_handles() {
        let harness = TestHarness::new(1);
        let session = Arc::new(TestMatcherSession::new([(0, 0..40)]));
        let server = tokio::spawn(serve_bloom_requests(harness.bloom_requests.clone()));

        drop(harness.backend.service_filter(Arc::clone(&session)));

        tokio::time::timeout(Duration::from_secs(5), async {
            while session.delivered().len() < 40 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("workers stopped before serving the session");
        assert_eq!(session.error(), None);
        assert!(!session.cancellation().is_cancelled());
        server.abort();
    }

    #[tokio::test]
    async fn test_cancelled_session_stops_workers() {
        let harness = TestHarness::new(1);
        let session = Arc::new(TestMatcherSession::new([(1, 0..64)]));
        session.cancellation().cancel();

        // Nobody serves the queue; the workers must still exit.
        for worker in harness.backend.service_filter(Arc::clone(&session)) {
            worker.await.unwrap();
        }

        assert!(harness.bloom_requests.is_empty());
    }
}
