//! Caller-facing intake.
//!
//! [`PurgeService`] is the single entry point through which purge work enters
//! the system. It validates the request, hands it to the queue and reports
//! the acceptance result synchronously. Nothing past the queue is ever
//! visible to the caller.

mod http;
pub use http::*;


use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::metrics::INTAKE_REQUESTS;
use crate::IntakeError;
use crate::PurgeBatch;
use crate::PurgeQueue;

#[derive(Clone)]
pub struct PurgeService {
    queue: Arc<PurgeQueue>,
}

impl PurgeService {
    pub fn new(queue: Arc<PurgeQueue>) -> Self {
        Self { queue }
    }

    /// Accepts `urls` as one purge batch.
    ///
    /// Returns once the batch is in the queue. Under blocking intake a full
    /// queue makes this wait until space frees up or `cancel` fires.
    pub async fn submit_purge(
        &self,
        urls: Vec<String>,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), IntakeError> {
        let result = match PurgeBatch::new(urls) {
            Ok(batch) => {
                let n = batch.len();
                self.queue.enqueue(batch, cancel).await.map(|()| n)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(n) => {
                INTAKE_REQUESTS.with_label_values(&["accepted"]).inc();
                debug!("[purge-service] accepted batch of {} url(s)", n);
                Ok(())
            }
            Err(e) => {
                INTAKE_REQUESTS.with_label_values(&[intake_label(&e)]).inc();
                warn!("[purge-service] rejected purge request: {}", e);
                Err(e)
            }
        }
    }

    pub fn queue(&self) -> &Arc<PurgeQueue> {
        &self.queue
    }
}

fn intake_label(e: &IntakeError) -> &'static str {
    match e {
        IntakeError::InvalidBatch(_) => "invalid",
        IntakeError::Backpressure { .. } => "backpressure",
        IntakeError::ShuttingDown => "shutting_down",
        IntakeError::Cancelled => "cancelled",
    }
}
