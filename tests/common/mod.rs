use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ocsp_purger::BackoffKind;
use ocsp_purger::BackoffPolicy;
use ocsp_purger::Purger;
use ocsp_purger::PurgerBuilder;
use ocsp_purger::PurgerConfig;
use serde_json::json;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use warp::http::StatusCode;
use warp::Filter;

pub const DRAIN_DEADLINE_MS: u64 = 1_000;

pub fn enable_logger() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum CdnMode {
    /// 201 with `httpStatus: 201`
    Accept,
    /// 500 on every request
    Fail,
    /// Never answers
    Hang,
}

/// A CDN purge API stand-in. Counts every purge request it receives.
pub struct FakeCdn {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl FakeCdn {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn spawn_fake_cdn(mode: CdnMode) -> FakeCdn {
    spawn_fake_cdn_at(mode, ([127, 0, 0, 1], 0).into())
}

/// Like [`spawn_fake_cdn`] on a fixed address, e.g. one handed out by
/// [`reserve_local_addr`] earlier.
pub fn spawn_fake_cdn_at(
    mode: CdnMode,
    addr: SocketAddr,
) -> FakeCdn {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let route = warp::post()
        .and(warp::path!("ccu" / "v3" / String / "url" / String))
        .and(warp::body::json())
        .and_then(move |_action: String, _network: String, _body: Value| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = match mode {
                    CdnMode::Accept => (
                        StatusCode::CREATED,
                        json!({"httpStatus": 201, "purgeId": "e2e", "estimatedSeconds": 5, "detail": "Request accepted"}),
                    ),
                    CdnMode::Fail => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({"httpStatus": 500, "detail": "purge backend unavailable"}),
                    ),
                    CdnMode::Hang => {
                        futures::future::pending::<()>().await;
                        unreachable!()
                    }
                };
                Ok::<_, warp::Rejection>(warp::reply::with_status(warp::reply::json(&body), status))
            }
        });

    let (addr, server) = warp::serve(route)
        .try_bind_ephemeral(addr)
        .expect("fake CDN should bind");
    tokio::spawn(server);
    FakeCdn { addr, hits }
}

/// A loopback address nothing listens on once this returns.
#[allow(dead_code)]
pub fn reserve_local_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}

/// Lifecycle test configuration pointed at `cdn`: ephemeral intake port,
/// fixed 10ms backoff, 3 attempts of at most 300ms each.
pub fn purger_config(
    cdn: &FakeCdn,
    capacity: usize,
    workers: usize,
) -> PurgerConfig {
    let mut config = PurgerConfig::default();
    config.queue.capacity = capacity;
    config.workers.count = workers;
    config.retry = BackoffPolicy {
        max_attempts: 3,
        backoff: BackoffKind::Fixed,
        base_delay_ms: 10,
        max_delay_ms: 10,
        jitter: 0.0,
        attempt_timeout_ms: 300,
    };
    config.upstream.targets = vec![cdn.base_url()];
    config.drain.deadline_ms = DRAIN_DEADLINE_MS;
    config.server.listen_address = "127.0.0.1:0".to_string();
    config.server.intake_timeout_ms = 500;
    config
}

pub struct RunningPurger {
    pub purger: Arc<Purger>,
    pub intake: SocketAddr,
    pub shutdown_tx: watch::Sender<()>,
    pub handle: JoinHandle<ocsp_purger::DrainReport>,
}

impl RunningPurger {
    pub fn purge_url(&self) -> String {
        format!("http://{}/purge", self.intake)
    }
}

pub fn start_purger(config: PurgerConfig) -> RunningPurger {
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let purger = Arc::new(
        PurgerBuilder::from_config(config, shutdown_rx)
            .build()
            .expect("purger should build"),
    );
    let intake = purger.start_http_server().expect("intake should bind");

    let runner = purger.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    RunningPurger {
        purger,
        intake,
        shutdown_tx,
        handle,
    }
}

/// Posts one purge request; returns the status code and JSON body.
pub async fn post_purge(
    client: &reqwest::Client,
    url: &str,
    urls: &[&str],
) -> (u16, Value) {
    let resp = client
        .post(url)
        .json(&json!({ "urls": urls }))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("intake should answer");
    let status = resp.status().as_u16();
    let body = resp.json::<Value>().await.expect("intake answers with JSON");
    (status, body)
}
