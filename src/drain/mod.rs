//! Graceful shutdown of the purge subsystem.
//!
//! The coordinator owns the lifecycle `Accepting -> Draining -> Done`. On
//! [`DrainCoordinator::begin_drain`] it closes intake, lets the worker pool
//! empty the queue, and bounds the whole phase with the drain deadline no
//! matter how the upstream behaves. The resulting [`DrainReport`] is computed
//! once and handed to every caller.

mod report;
mod stats;

pub use report::*;
pub use stats::*;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::PurgeQueue;
use crate::WorkerPool;

pub struct DrainCoordinator {
    queue: Arc<PurgeQueue>,
    pool: Arc<WorkerPool>,
    stats: Arc<PurgeStats>,
    deadline: Duration,
    state_tx: watch::Sender<DrainState>,
    report: OnceCell<DrainReport>,
}

impl DrainCoordinator {
    pub fn new(
        queue: Arc<PurgeQueue>,
        pool: Arc<WorkerPool>,
        stats: Arc<PurgeStats>,
        deadline: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(DrainState::Accepting);
        Self {
            queue,
            pool,
            stats,
            deadline,
            state_tx,
            report: OnceCell::new(),
        }
    }

    /// Starts the worker pool.
    pub fn start(&self) {
        self.pool.run();
    }

    pub fn state(&self) -> DrainState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DrainState> {
        self.state_tx.subscribe()
    }

    pub fn stats(&self) -> &Arc<PurgeStats> {
        &self.stats
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// The report, once a drain has finished.
    pub fn report(&self) -> Option<DrainReport> {
        self.report.get().copied()
    }

    /// Closes intake and drains outstanding work within the deadline.
    ///
    /// Idempotent: concurrent and repeated calls all receive the report of
    /// the single drain that actually ran.
    pub async fn begin_drain(&self) -> DrainReport {
        *self.report.get_or_init(|| self.drain()).await
    }

    async fn drain(&self) -> DrainReport {
        self.state_tx.send_replace(DrainState::Draining);
        self.queue.close();
        // no-op unless the pool was never started
        self.pool.run();
        info!(
            "[drain] intake closed; draining {} buffered batch(es), deadline {:?}",
            self.queue.len(),
            self.deadline
        );

        let outcome = match timeout(self.deadline, self.pool.join()).await {
            Ok(()) if self.queue.is_empty() => DrainOutcome::Completed,
            Ok(()) => {
                warn!(
                    "[drain] workers exited with {} batch(es) still queued",
                    self.queue.len()
                );
                DrainOutcome::TimedOut
            }
            Err(_) => {
                warn!(
                    "[drain] deadline {:?} elapsed with {} batch(es) still queued, aborting in-flight purges",
                    self.deadline,
                    self.queue.len()
                );
                self.pool.stop();
                self.pool.abort_in_flight();
                DrainOutcome::TimedOut
            }
        };

        let report = self.build_report(outcome);
        if report.timed_out > 0 {
            error!(
                "[drain] {} accepted batch(es) never reached a terminal outcome",
                report.timed_out
            );
        }
        self.state_tx.send_replace(DrainState::Done(outcome));
        info!("[drain] finished: {:?}", report);
        report
    }

    fn build_report(
        &self,
        outcome: DrainOutcome,
    ) -> DrainReport {
        let total_accepted = self.queue.enqueued_total();
        let snap = self.stats.snapshot();
        // Batches still queued or in flight are failed-by-timeout.
        let timed_out = total_accepted.saturating_sub(snap.resolved());
        DrainReport {
            total_accepted,
            purged: snap.purged,
            failed: total_accepted.saturating_sub(snap.purged),
            timed_out,
            outcome,
        }
    }
}
