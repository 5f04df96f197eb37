//! Prometheus collectors for intake, upstream attempts and queue depth, plus
//! the `/metrics` scrape endpoint.


use std::net::SocketAddr;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::Result;
use crate::SystemError;

lazy_static! {
    pub static ref INTAKE_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("purge_intake_total", "Purge requests seen at intake, by result"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref UPSTREAM_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("purge_attempts_total", "Upstream purge calls, by target and result"),
        &["target", "result"]
    )
    .expect("metric can not be created");

    pub static ref BATCH_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("purge_outcomes_total", "Terminal purge batch outcomes"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_DEPTH: IntGauge =
        IntGauge::new("purge_queue_depth", "Purge batches buffered and not yet dequeued")
            .expect("metric can not be created");

    pub static ref BATCH_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "purge_batch_latency_seconds",
            "Wall-clock time from first attempt to terminal outcome"
        )
        .buckets(exponential_buckets(0.01, 2.0, 14).expect("static bucket layout is valid"))
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

/// Registers every purger collector into `registry`.
///
/// Registering twice into the same registry is reported and ignored.
pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(INTAKE_REQUESTS.clone()),
        Box::new(UPSTREAM_ATTEMPTS.clone()),
        Box::new(BATCH_OUTCOMES.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(BATCH_LATENCY.clone()),
    ];
    for c in collectors {
        if let Err(e) = registry.register(c) {
            warn!("[metrics] collector registration skipped: {}", e);
        }
    }
}

/// Binds the `/metrics` endpoint and returns the bound address together with
/// the server future; the future completes once `shutdown_signal` fires.
pub fn bind_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<(SocketAddr, impl std::future::Future<Output = ()>)> {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics").and(warp::get()).and_then(metrics_handler);

    let (addr, server) = warp::serve(metrics_route)
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        })
        .map_err(|e| SystemError::ServerBind {
            service: "metrics",
            address: format!("0.0.0.0:{port}"),
            reason: e.to_string(),
        })?;

    info!("[metrics] prometheus endpoint listening on {}", addr);
    Ok((addr, server))
}

async fn metrics_handler() -> std::result::Result<impl Reply, Rejection> {
    Ok(gather_text(&REGISTRY))
}

/// Text exposition of `registry`; encoding errors are logged and yield what
/// could be encoded.
pub fn gather_text(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
