use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::metrics::BATCH_OUTCOMES;
use crate::SubmissionOutcome;

/// Outcome counters shared between the worker pool and the drain coordinator.
///
/// Workers only ever call the recording methods; the coordinator reads a
/// [`StatsSnapshot`] when it builds the final report.
#[derive(Debug, Default)]
pub struct PurgeStats {
    purged: AtomicU64,
    exhausted: AtomicU64,
    cancelled: AtomicU64,
    in_flight: AtomicU64,
    upstream_calls: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub purged: u64,
    /// Batches that used up every attempt
    pub exhausted: u64,
    /// Batches whose attempt sequence was aborted
    pub cancelled: u64,
    pub in_flight: u64,
    pub upstream_calls: u64,
}

impl StatsSnapshot {
    /// Batches with a terminal `Failed` outcome
    pub fn failed(&self) -> u64 {
        self.exhausted + self.cancelled
    }

    /// Batches with any terminal outcome
    pub fn resolved(&self) -> u64 {
        self.purged + self.failed()
    }
}

impl PurgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker took ownership of a batch
    pub(crate) fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// The batch taken in [`PurgeStats::begin`] reached `outcome`
    pub(crate) fn record(
        &self,
        outcome: &SubmissionOutcome,
    ) {
        self.upstream_calls
            .fetch_add(outcome.attempts() as u64, Ordering::SeqCst);
        match outcome.error() {
            None => {
                self.purged.fetch_add(1, Ordering::SeqCst);
                BATCH_OUTCOMES.with_label_values(&["purged"]).inc();
            }
            Some(e) if e.is_cancelled() => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                BATCH_OUTCOMES.with_label_values(&["failed"]).inc();
            }
            Some(_) => {
                self.exhausted.fetch_add(1, Ordering::SeqCst);
                BATCH_OUTCOMES.with_label_values(&["failed"]).inc();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            purged: self.purged.load(Ordering::SeqCst),
            exhausted: self.exhausted.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            upstream_calls: self.upstream_calls.load(Ordering::SeqCst),
        }
    }
}
