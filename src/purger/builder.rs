//! Assembly of a [`Purger`] from configuration.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let purger = PurgerBuilder::new(Some("config/purger.toml"), shutdown_rx)?.build()?;
//! purger.start_http_server()?;
//! let report = purger.run().await;
//! ```
//!
//! Upstream targets default to one [`crate::HttpPurgeClient`] per configured
//! base URL; [`PurgerBuilder::upstream_targets`] replaces them, which is how
//! tests put a fake CDN behind the pipeline.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use super::Purger;
use crate::http_targets;
use crate::DrainCoordinator;
use crate::PurgeQueue;
use crate::PurgeService;
use crate::PurgeStats;
use crate::PurgerConfig;
use crate::Result;
use crate::RetryingSubmitter;
use crate::UpstreamTarget;
use crate::WorkerPool;

pub struct PurgerBuilder {
    config: PurgerConfig,
    shutdown_signal: watch::Receiver<()>,
    upstream_targets: Option<Vec<UpstreamTarget>>,
}

impl PurgerBuilder {
    /// Loads configuration from the layered sources, optionally merging one
    /// more file on top.
    pub fn new(
        config_path: Option<&str>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Result<Self> {
        let mut config = PurgerConfig::new()?;
        if let Some(p) = config_path {
            info!("with_override_config from: {}", p);
            config = config.with_override_config(p)?;
        }
        Ok(Self::from_config(config, shutdown_signal))
    }

    /// Uses an in-memory configuration as is.
    pub fn from_config(
        config: PurgerConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            shutdown_signal,
            upstream_targets: None,
        }
    }

    /// Replaces the configured upstream targets
    pub fn upstream_targets(
        mut self,
        targets: Vec<UpstreamTarget>,
    ) -> Self {
        self.upstream_targets = Some(targets);
        self
    }

    pub fn config(&self) -> &PurgerConfig {
        &self.config
    }

    /// Validates the configuration and wires queue, submitter, worker pool,
    /// drain coordinator and intake service together. Nothing is spawned
    /// until [`Purger::run`].
    pub fn build(self) -> Result<Purger> {
        let config = self.config.validate()?;

        let targets = match self.upstream_targets {
            Some(targets) => targets,
            None => http_targets(&config.upstream, config.retry.attempt_timeout())?,
        };
        debug!(
            "[builder] upstream targets: {:?}",
            targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        let queue = Arc::new(PurgeQueue::new(config.queue.capacity, config.queue.intake_mode));
        let submitter = Arc::new(RetryingSubmitter::new(targets, config.retry));
        let stats = Arc::new(PurgeStats::new());
        let pool = Arc::new(WorkerPool::new(
            config.workers.count,
            queue.clone(),
            submitter,
            stats.clone(),
        ));
        let coordinator = Arc::new(DrainCoordinator::new(
            queue.clone(),
            pool,
            stats,
            config.drain.deadline(),
        ));
        let service = PurgeService::new(queue);

        info!(
            "[builder] purger ready: capacity={} intake={:?} workers={} max_attempts={}",
            config.queue.capacity, config.queue.intake_mode, config.workers.count, config.retry.max_attempts
        );

        Ok(Purger::new(Arc::new(config), service, coordinator, self.shutdown_signal))
    }
}
