//! Fixed-size pool of purge consumers.
//!
//! Each worker loops: dequeue a batch, drive it to a terminal outcome through
//! the [`RetryingSubmitter`], record the outcome. Two tokens control a worker:
//! - `stop`: no further dequeues; the batch in hand is still finished.
//! - `abort`: the in-flight attempt sequence is cut short and recorded as
//!   cancelled. Only used once the drain deadline has passed.


use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::utils::async_task::spawn_task;
use crate::DequeueError;
use crate::PurgeQueue;
use crate::PurgeStats;
use crate::Result;
use crate::RetryingSubmitter;
use crate::SubmissionOutcome;

pub struct WorkerPool {
    size: usize,
    queue: Arc<PurgeQueue>,
    submitter: Arc<RetryingSubmitter>,
    stats: Arc<PurgeStats>,
    stop: CancellationToken,
    abort: CancellationToken,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        queue: Arc<PurgeQueue>,
        submitter: Arc<RetryingSubmitter>,
        stats: Arc<PurgeStats>,
    ) -> Self {
        Self {
            size: size.max(1),
            queue,
            submitter,
            stats,
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Launches the consumer loops. A pool runs at most once: later calls,
    /// including after [`WorkerPool::join`], are no-ops.
    pub fn run(&self) {
        let mut handles = self.handles.lock();
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("[worker-pool] already started, run() ignored");
            return;
        }

        for id in 0..self.size {
            let queue = self.queue.clone();
            let submitter = self.submitter.clone();
            let stats = self.stats.clone();
            let stop = self.stop.clone();
            let abort = self.abort.clone();
            spawn_task(
                &format!("purge-worker-{id}"),
                move || worker_loop(id, queue, submitter, stats, stop, abort),
                Some(&mut *handles),
            );
        }
        info!("[worker-pool] started {} purge worker(s)", self.size);
    }

    /// Workers exit after finishing the batch they currently hold.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// In-flight attempt sequences give up at their next suspension point.
    pub fn abort_in_flight(&self) {
        self.abort.cancel();
    }

    /// Waits for every worker loop to exit.
    pub async fn join(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for r in join_all(handles).await {
            if let Err(e) = r {
                error!("[worker-pool] worker task panicked: {:?}", e);
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    queue: Arc<PurgeQueue>,
    submitter: Arc<RetryingSubmitter>,
    stats: Arc<PurgeStats>,
    stop: CancellationToken,
    abort: CancellationToken,
) -> Result<()> {
    loop {
        if stop.is_cancelled() {
            debug!("[worker-{}] stopped", id);
            break;
        }

        let batch = match queue.dequeue(&stop).await {
            Ok(batch) => batch,
            Err(DequeueError::Closed) => {
                debug!("[worker-{}] queue closed and drained, exiting", id);
                break;
            }
            Err(DequeueError::Cancelled) => {
                debug!("[worker-{}] stopped", id);
                break;
            }
        };

        stats.begin();
        let outcome = submitter.attempt(&abort, &batch).await;
        stats.record(&outcome);

        match &outcome {
            SubmissionOutcome::Purged { attempts, target } => {
                debug!(
                    "[worker-{}] purged {} url(s) via {} after {} attempt(s)",
                    id,
                    batch.len(),
                    target,
                    attempts
                );
            }
            SubmissionOutcome::Failed { error } if queue.is_closed() => {
                warn!(
                    "[worker-{}] dropping {} url(s) during shutdown: {}",
                    id,
                    batch.len(),
                    error
                );
            }
            SubmissionOutcome::Failed { error } => {
                // Outside shutdown a terminal failure means stale responses
                // stay cached; surface it loudly.
                error!(
                    "[worker-{}] failed to purge {:?}: {} ({} attempt(s))",
                    id,
                    batch.urls(),
                    error,
                    outcome.attempts()
                );
            }
        }
    }
    Ok(())
}
