use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::fake_target;
use crate::test_utils::test_config;
use crate::test_utils::FakeBehavior;
use crate::test_utils::FakePurgeClient;
use crate::DrainOutcome;
use crate::IntakeError;

fn purger_with(
    behavior: FakeBehavior,
    config: PurgerConfig,
) -> (Arc<Purger>, Arc<FakePurgeClient>, watch::Sender<()>) {
    let client = FakePurgeClient::new(behavior);
    let (tx, rx) = watch::channel(());
    let purger = PurgerBuilder::from_config(config, rx)
        .upstream_targets(vec![fake_target("fake-cdn", client.clone())])
        .build()
        .unwrap();
    (Arc::new(purger), client, tx)
}

#[tokio::test]
async fn test_run_drains_after_shutdown_signal() {
    enable_logger();
    let (purger, client, tx) = purger_with(FakeBehavior::Succeed, test_config());
    let runner = purger.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let token = CancellationToken::new();
    for i in 0..10 {
        purger
            .service()
            .submit_purge(vec![format!("http://ocsp.example/{i}")], &token)
            .await
            .unwrap();
    }
    tx.send(()).unwrap();

    let report = timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert_eq!(report.total_accepted, 10);
    assert_eq!(report.purged, 10);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(client.calls(), 10);
}

#[tokio::test]
async fn test_dropped_shutdown_sender_still_drains() {
    let (purger, _client, tx) = purger_with(FakeBehavior::Succeed, test_config());
    drop(tx);

    let report = timeout(Duration::from_secs(5), purger.run()).await.unwrap();

    assert_eq!(report.total_accepted, 0);
    assert_eq!(report.outcome, DrainOutcome::Completed);
}

#[tokio::test]
async fn test_http_intake_stops_after_drain() {
    let (purger, _client, tx) = purger_with(FakeBehavior::Succeed, test_config());
    let addr = purger.start_http_server().unwrap();
    let runner = purger.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let http = reqwest::Client::new();
    let resp = http
        .post(format!("http://{addr}/purge"))
        .json(&json!({"urls": ["http://ocsp.example/a"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    tx.send(()).unwrap();
    let report = timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert_eq!(report.purged, 1);

    let err = purger
        .service()
        .submit_purge(vec!["http://ocsp.example/b".into()], &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, IntakeError::ShuttingDown);
    assert!(
        http.post(format!("http://{addr}/purge"))
            .json(&json!({"urls": ["http://ocsp.example/c"]}))
            .send()
            .await
            .is_err(),
        "intake listener should be gone"
    );
}

#[tokio::test]
async fn test_metrics_server_disabled_by_default() {
    let (purger, _client, _tx) = purger_with(FakeBehavior::Succeed, test_config());
    assert_eq!(purger.start_metrics_server().unwrap(), None);
}

#[tokio::test]
async fn test_metrics_server_serves_purge_metrics() {
    let mut config = test_config();
    config.monitoring.prometheus_enabled = true;
    config.monitoring.prometheus_port = 0;
    let (purger, _client, tx) = purger_with(FakeBehavior::Succeed, config);

    let addr = purger.start_metrics_server().unwrap().unwrap();
    purger
        .service()
        .submit_purge(vec!["http://ocsp.example/m".into()], &CancellationToken::new())
        .await
        .unwrap();

    let body = reqwest::get(format!("http://127.0.0.1:{}/metrics", addr.port()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("purge_intake_total"));

    tx.send(()).unwrap();
    timeout(Duration::from_secs(5), purger.run()).await.unwrap();
}

#[tokio::test]
async fn test_stuck_servers_share_one_grace_period() {
    let mut config = test_config();
    config.server.intake_timeout_ms = 200;
    let (purger, _client, _tx) = purger_with(FakeBehavior::Succeed, config);
    for _ in 0..3 {
        purger
            .servers
            .lock()
            .push(tokio::spawn(std::future::pending::<()>()));
    }

    let started = std::time::Instant::now();
    purger.stop_servers().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(400), "stop took {elapsed:?}");
    assert!(purger.servers.lock().is_empty());
}
