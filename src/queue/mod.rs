//! Bounded FIFO buffer between purge intake and the worker pool.
//!
//! The queue is the only place purge work is held in memory. It never drops a
//! batch on its own: a producer either gets its batch in, waits, or receives
//! an explicit [`IntakeError`].
//!
//! Waiters are parked on [`Notify`] and register interest *before* checking
//! the buffer, so a push or pop racing with a waiter can never be missed.

mod batch;
pub use batch::*;


use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics::QUEUE_DEPTH;
use crate::IntakeError;
use crate::IntakeMode;

/// Why [`PurgeQueue::dequeue`] returned without a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DequeueError {
    /// Queue is closed and every buffered batch has been handed out
    #[error("purge queue is closed and drained")]
    Closed,

    #[error("dequeue cancelled")]
    Cancelled,
}

struct QueueState {
    buffer: VecDeque<PurgeBatch>,
    closed: bool,
}

pub struct PurgeQueue {
    capacity: usize,
    mode: IntakeMode,
    state: Mutex<QueueState>,
    not_empty: Notify,
    not_full: Notify,
    enqueued_total: AtomicU64,
}

impl PurgeQueue {
    pub fn new(
        capacity: usize,
        mode: IntakeMode,
    ) -> Self {
        Self {
            capacity,
            mode,
            state: Mutex::new(QueueState {
                buffer: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            enqueued_total: AtomicU64::new(0),
        }
    }

    /// Appends `batch` to the tail.
    ///
    /// At capacity, [`IntakeMode::Blocking`] waits for space until `cancel`
    /// fires and [`IntakeMode::Rejecting`] fails with
    /// [`IntakeError::Backpressure`]. A closed queue always fails with
    /// [`IntakeError::ShuttingDown`], including for producers already blocked.
    pub async fn enqueue(
        &self,
        batch: PurgeBatch,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), IntakeError> {
        let mut batch = Some(batch);
        loop {
            let space = self.not_full.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            if let Some(b) = batch.take() {
                match self.try_push(b) {
                    Ok(()) => return Ok(()),
                    Err((b, IntakeError::Backpressure { capacity })) if self.mode == IntakeMode::Blocking => {
                        debug!("[queue] full at {capacity}, producer waiting for space");
                        batch = Some(b);
                    }
                    Err((_, e)) => return Err(e),
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IntakeError::Cancelled),
                _ = &mut space => {}
            }
        }
    }

    /// Non-waiting enqueue regardless of the configured intake mode.
    pub fn try_enqueue(
        &self,
        batch: PurgeBatch,
    ) -> std::result::Result<(), IntakeError> {
        self.try_push(batch).map_err(|(_, e)| e)
    }

    fn try_push(
        &self,
        batch: PurgeBatch,
    ) -> std::result::Result<(), (PurgeBatch, IntakeError)> {
        let depth = {
            let mut state = self.state.lock();
            if state.closed {
                return Err((batch, IntakeError::ShuttingDown));
            }
            if state.buffer.len() >= self.capacity {
                return Err((
                    batch,
                    IntakeError::Backpressure {
                        capacity: self.capacity,
                    },
                ));
            }
            state.buffer.push_back(batch);
            // Counted under the lock so a batch is never visible to a worker
            // before it is part of the accepted total.
            self.enqueued_total.fetch_add(1, Ordering::SeqCst);
            state.buffer.len()
        };

        QUEUE_DEPTH.set(depth as i64);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head batch, waiting until one is available.
    ///
    /// Returns [`DequeueError::Closed`] once the queue is closed and empty,
    /// and [`DequeueError::Cancelled`] if `cancel` fires first.
    pub async fn dequeue(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<PurgeBatch, DequeueError> {
        loop {
            let available = self.not_empty.notified();
            tokio::pin!(available);
            available.as_mut().enable();

            let popped = {
                let mut state = self.state.lock();
                match state.buffer.pop_front() {
                    Some(batch) => Some((batch, state.buffer.len())),
                    None if state.closed => return Err(DequeueError::Closed),
                    None => None,
                }
            };

            if let Some((batch, depth)) = popped {
                QUEUE_DEPTH.set(depth as i64);
                self.not_full.notify_one();
                return Ok(batch);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DequeueError::Cancelled),
                _ = &mut available => {}
            }
        }
    }

    /// Stops intake. Buffered batches stay dequeueable. Idempotent.
    pub fn close(&self) {
        let newly_closed = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };

        if newly_closed {
            debug!("[queue] closed with {} batch(es) buffered", self.len());
        }
        // Wake everyone: producers must observe ShuttingDown, idle workers
        // must observe Closed once the buffer empties.
        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mode(&self) -> IntakeMode {
        self.mode
    }

    /// Number of batches ever accepted into the queue.
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_total.load(Ordering::SeqCst)
    }
}
