//! Process-level lifecycle: intake server, metrics exporter, workers and the
//! shutdown drain, tied to one shutdown signal.

mod builder;
pub use builder::*;

#[cfg(test)]
mod purger_test;

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::bind_http_server;
use crate::metrics;
use crate::DrainCoordinator;
use crate::DrainReport;
use crate::PurgeService;
use crate::PurgerConfig;
use crate::Result;

pub struct Purger {
    config: Arc<PurgerConfig>,
    service: PurgeService,
    coordinator: Arc<DrainCoordinator>,
    shutdown_signal: watch::Receiver<()>,
    http_shutdown: CancellationToken,
    http_addr: Mutex<Option<SocketAddr>>,
    servers: Mutex<Vec<JoinHandle<()>>>,
}

impl Purger {
    pub(super) fn new(
        config: Arc<PurgerConfig>,
        service: PurgeService,
        coordinator: Arc<DrainCoordinator>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            service,
            coordinator,
            shutdown_signal,
            http_shutdown: CancellationToken::new(),
            http_addr: Mutex::new(None),
            servers: Mutex::new(Vec::new()),
        }
    }

    /// Binds the intake endpoint on `server.listen_address` and serves it
    /// until the drain has closed intake.
    pub fn start_http_server(&self) -> Result<SocketAddr> {
        let token = self.http_shutdown.clone();
        let (addr, server) = bind_http_server(
            self.config.server.socket_addr()?,
            self.service.clone(),
            self.config.server.intake_timeout(),
            async move { token.cancelled().await },
        )?;

        *self.http_addr.lock() = Some(addr);
        self.servers.lock().push(tokio::spawn(server));
        Ok(addr)
    }

    /// Starts the Prometheus exporter when `monitoring.prometheus_enabled`.
    pub fn start_metrics_server(&self) -> Result<Option<SocketAddr>> {
        if !self.config.monitoring.prometheus_enabled {
            debug!("[purger] prometheus exporter disabled");
            return Ok(None);
        }

        let (addr, server) = metrics::bind_server(self.config.monitoring.prometheus_port, self.shutdown_signal.clone())?;
        self.servers.lock().push(tokio::spawn(server));
        Ok(Some(addr))
    }

    /// Starts the workers, waits for the shutdown signal, drains and returns
    /// the final report. The intake server stops after the queue is closed.
    pub async fn run(&self) -> DrainReport {
        self.coordinator.start();
        info!("[purger] accepting purge requests");

        let mut shutdown = self.shutdown_signal.clone();
        if shutdown.changed().await.is_err() {
            warn!("[purger] shutdown sender dropped, draining");
        } else {
            info!("[purger] shutdown signal received, draining");
        }

        let report = self.coordinator.begin_drain().await;
        self.stop_servers().await;
        report
    }

    /// Stops every server task, bounded by one shared grace period.
    async fn stop_servers(&self) {
        self.http_shutdown.cancel();

        let handles = std::mem::take(&mut *self.servers.lock());
        let grace = self.config.server.intake_timeout();
        match timeout(grace, join_all(handles)).await {
            Ok(results) => {
                for r in results {
                    if let Err(e) = r {
                        warn!("[purger] server task failed: {:?}", e);
                    }
                }
            }
            Err(_) => warn!("[purger] servers did not stop within {:?}", grace),
        }
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        *self.http_addr.lock()
    }

    pub fn service(&self) -> &PurgeService {
        &self.service
    }

    pub fn coordinator(&self) -> &Arc<DrainCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &PurgerConfig {
        &self.config
    }
}
