use crate::BackendError;
use eth_backend_types::PoolError;

#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const RESOLVE_ERRORS_TOTAL: &'static str = "eth_backend_resolve_errors_total";
    pub(crate) const TRANSACTIONS_SUBMITTED_TOTAL: &'static str =
        "eth_backend_transactions_submitted_total";
    pub(crate) const BLOOM_WORKERS_ACTIVE: &'static str = "eth_backend_bloom_workers_active";

    pub(crate) fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::RESOLVE_ERRORS_TOTAL,
            metrics::Unit::Count,
            "Total number of failed header, block and state resolutions, by error kind",
        );

        metrics::describe_counter!(
            Self::TRANSACTIONS_SUBMITTED_TOTAL,
            metrics::Unit::Count,
            "Total number of transactions submitted to the pool, by outcome",
        );

        metrics::describe_gauge!(
            Self::BLOOM_WORKERS_ACTIVE,
            metrics::Unit::Count,
            "Number of running bloom retrieval workers",
        );
    }

    fn zero() {
        metrics::counter!(Self::RESOLVE_ERRORS_TOTAL).increment(0);

        metrics::counter!(Self::TRANSACTIONS_SUBMITTED_TOTAL, "result" => "accepted").increment(0);
        metrics::counter!(Self::TRANSACTIONS_SUBMITTED_TOTAL, "result" => "rejected").increment(0);

        // Shared by every backend; never reset.
        metrics::gauge!(Self::BLOOM_WORKERS_ACTIVE).increment(0.0);
    }

    pub(crate) fn record_resolve_error(err: &BackendError) {
        metrics::counter!(
            Self::RESOLVE_ERRORS_TOTAL,
            "kind" => err.kind().to_string(),
        )
        .increment(1);
    }

    pub(crate) fn record_submission(result: &Result<(), PoolError>) {
        let outcome = if result.is_ok() { "accepted" } else { "rejected" };
        metrics::counter!(Self::TRANSACTIONS_SUBMITTED_TOTAL, "result" => outcome).increment(1);
    }

    pub(crate) fn bloom_worker_started() {
        metrics::gauge!(Self::BLOOM_WORKERS_ACTIVE).increment(1.0);
    }

    pub(crate) fn bloom_worker_stopped() {
        metrics::gauge!(Self::BLOOM_WORKERS_ACTIVE).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestHarness;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    #[derive(Debug, Default)]
    struct WorkerGaugeRecorder {
        workers: Arc<AtomicU64>,
    }

    impl Recorder for WorkerGaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            if key.name() == Metrics::BLOOM_WORKERS_ACTIVE {
                Gauge::from_arc(Arc::clone(&self.workers))
            } else {
                Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_new_backend_keeps_running_worker_count() {
        let recorder = WorkerGaugeRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            Metrics::bloom_worker_started();
            Metrics::bloom_worker_started();
            let _second = TestHarness::new(1);
            Metrics::bloom_worker_stopped();
        });
        assert_eq!(f64::from_bits(recorder.workers.load(Ordering::SeqCst)), 1.0);
    }
}
