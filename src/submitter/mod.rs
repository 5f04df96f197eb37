//! Retrying submission of one purge batch across equivalent upstream targets.
//!
//! A batch gets at most `max_attempts` upstream calls. Each call goes to the
//! next target in a round-robin rotation shared by all workers, so a single
//! unhealthy endpoint only costs one attempt before the next one is tried.

mod outcome;
pub use outcome::*;


use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::metrics::BATCH_LATENCY;
use crate::metrics::UPSTREAM_ATTEMPTS;
use crate::BackoffPolicy;
use crate::PurgeBatch;
use crate::SubmitError;
use crate::UpstreamError;

/// The CDN purge capability: one network call against one endpoint.
///
/// Implementations do not retry; retries and rotation belong to
/// [`RetryingSubmitter`]. Dropping the returned future must abort the call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PurgeClient: Send + Sync + 'static {
    async fn submit(
        &self,
        urls: &[String],
    ) -> std::result::Result<(), UpstreamError>;
}

/// A named purge endpoint.
#[derive(Clone)]
pub struct UpstreamTarget {
    pub name: String,
    pub client: Arc<dyn PurgeClient>,
}

impl UpstreamTarget {
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn PurgeClient>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

impl std::fmt::Debug for UpstreamTarget {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("UpstreamTarget").field("name", &self.name).finish()
    }
}

pub struct RetryingSubmitter {
    targets: Vec<UpstreamTarget>,
    policy: BackoffPolicy,
    next_target: AtomicUsize,
}

impl RetryingSubmitter {
    pub fn new(
        targets: Vec<UpstreamTarget>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            targets,
            policy,
            next_target: AtomicUsize::new(0),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn targets(&self) -> &[UpstreamTarget] {
        &self.targets
    }

    fn next_target(&self) -> &UpstreamTarget {
        let idx = self.next_target.fetch_add(1, Ordering::Relaxed) % self.targets.len();
        &self.targets[idx]
    }

    /// Drives `batch` to a terminal outcome.
    ///
    /// Returns as soon as one target accepts the purge. Once `cancel` fires,
    /// the in-flight call or backoff sleep is abandoned and the batch is
    /// reported as [`SubmitError::Cancelled`].
    pub async fn attempt(
        &self,
        cancel: &CancellationToken,
        batch: &PurgeBatch,
    ) -> SubmissionOutcome {
        let started = Instant::now();
        let outcome = self.attempt_inner(cancel, batch).await;
        BATCH_LATENCY.observe(started.elapsed().as_secs_f64());
        outcome
    }

    async fn attempt_inner(
        &self,
        cancel: &CancellationToken,
        batch: &PurgeBatch,
    ) -> SubmissionOutcome {
        if self.targets.is_empty() {
            return SubmissionOutcome::Failed {
                error: SubmitError::NoTargets,
            };
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let attempt_timeout = self.policy.attempt_timeout();
        let mut last_error: Option<UpstreamError> = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return cancelled(attempt - 1, last_error);
            }

            let target = self.next_target();
            debug!(
                "[submitter] attempt {}/{} for {} url(s) via {}",
                attempt,
                max_attempts,
                batch.len(),
                target.name
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(attempt, last_error),
                r = timeout(attempt_timeout, target.client.submit(batch.urls())) => r,
            };

            let err = match result {
                Ok(Ok(())) => {
                    UPSTREAM_ATTEMPTS.with_label_values(&[&target.name, "ok"]).inc();
                    return SubmissionOutcome::Purged {
                        attempts: attempt,
                        target: target.name.clone(),
                    };
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => UpstreamError::Timeout(attempt_timeout),
            };

            UPSTREAM_ATTEMPTS.with_label_values(&[&target.name, "error"]).inc();
            warn!(
                "[submitter] attempt {}/{} via {} failed: {}",
                attempt, max_attempts, target.name, err
            );
            last_error = Some(err);

            if attempt < max_attempts {
                let delay = self.policy.delay_for(attempt);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return cancelled(attempt, last_error),
                    _ = sleep(delay) => {}
                }
            }
        }

        match last_error {
            Some(last_error) => SubmissionOutcome::Failed {
                error: SubmitError::ExhaustedRetries {
                    attempts: max_attempts,
                    last_error,
                },
            },
            // every loop iteration either returns or records an error
            None => SubmissionOutcome::Failed {
                error: SubmitError::NoTargets,
            },
        }
    }
}

fn cancelled(
    attempts: usize,
    last_error: Option<UpstreamError>,
) -> SubmissionOutcome {
    SubmissionOutcome::Failed {
        error: SubmitError::Cancelled {
            attempts,
            last_error,
        },
    }
}
