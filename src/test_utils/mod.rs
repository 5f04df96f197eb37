//! Shared fakes for unit tests.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::BackoffKind;
use crate::BackoffPolicy;
use crate::PurgeClient;
use crate::UpstreamError;
use crate::UpstreamTarget;

#[derive(Debug, Clone, Copy)]
pub enum FakeBehavior {
    Succeed,
    Fail,
    /// Fail the first `n` calls, then succeed
    FailFirst(usize),
    /// Never return
    Hang,
    /// Succeed after sleeping
    Delay(Duration),
}

/// Scripted [`PurgeClient`] that records every call.
pub struct FakePurgeClient {
    behavior: FakeBehavior,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl FakePurgeClient {
    pub fn new(behavior: FakeBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PurgeClient for FakePurgeClient {
    async fn submit(
        &self,
        urls: &[String],
    ) -> std::result::Result<(), UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(urls.to_vec());

        match self.behavior {
            FakeBehavior::Succeed => Ok(()),
            FakeBehavior::Fail => Err(UpstreamError::Rejected("fake upstream down".into())),
            FakeBehavior::FailFirst(k) if n < k => Err(UpstreamError::Rejected(format!("fake failure #{}", n + 1))),
            FakeBehavior::FailFirst(_) => Ok(()),
            FakeBehavior::Hang => {
                futures::future::pending::<()>().await;
                Ok(())
            }
            FakeBehavior::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }
}

pub fn fake_target(
    name: &str,
    client: Arc<FakePurgeClient>,
) -> UpstreamTarget {
    UpstreamTarget::new(name, client)
}

/// Fast, deterministic policy: fixed 10ms backoff, no jitter.
pub fn fast_policy(max_attempts: usize) -> BackoffPolicy {
    BackoffPolicy {
        max_attempts,
        backoff: BackoffKind::Fixed,
        base_delay_ms: 10,
        max_delay_ms: 10,
        jitter: 0.0,
        attempt_timeout_ms: 1_000,
    }
}

pub fn enable_logger() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Small, fast configuration for lifecycle tests: ephemeral intake port,
/// single worker, fixed 10ms backoff.
pub fn test_config() -> crate::PurgerConfig {
    let mut config = crate::PurgerConfig::default();
    config.queue.capacity = 10;
    config.workers.count = 1;
    config.retry = fast_policy(3);
    config.drain.deadline_ms = 2_000;
    config.server.listen_address = "127.0.0.1:0".to_string();
    config.server.intake_timeout_ms = 200;
    config
}
