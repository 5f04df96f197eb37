mod common;

use std::time::Duration;
use std::time::Instant;

use common::*;
use ocsp_purger::DrainOutcome;
use tokio::time::timeout;

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_batches_purged_then_clean_exit() {
    enable_logger();
    let cdn = spawn_fake_cdn(CdnMode::Accept);
    let running = start_purger(purger_config(&cdn, 10, 1));
    let http = reqwest::Client::new();

    for i in 0..10 {
        let url = format!("http://ocsp.example.com/MFQwUjBQME4wTDAJ{i}");
        let (status, body) = post_purge(&http, &running.purge_url(), &[url.as_str()]).await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["accepted"], true);
    }

    running.shutdown_tx.send(()).unwrap();
    let report = timeout(RUN_TIMEOUT, running.handle).await.unwrap().unwrap();

    assert_eq!(report.total_accepted, 10);
    assert_eq!(report.purged, 10);
    assert_eq!(report.failed, 0);
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        report.summary(),
        "Shutting down; finished purging OCSP responses for 10 certificates."
    );
    assert_eq!(cdn.hits(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_cdn_yields_non_zero_exit() {
    let cdn = spawn_fake_cdn(CdnMode::Fail);
    let running = start_purger(purger_config(&cdn, 10, 1));
    let http = reqwest::Client::new();

    let (status, _) = post_purge(&http, &running.purge_url(), &["http://ocsp.example.com/one"]).await;
    assert_eq!(status, 200);

    running.shutdown_tx.send(()).unwrap();
    let report = timeout(RUN_TIMEOUT, running.handle).await.unwrap().unwrap();

    assert_eq!(report.total_accepted, 1);
    assert_eq!(report.failed, 1);
    assert_ne!(report.exit_code(), 0);
    assert_eq!(
        report.summary(),
        "failed to purge OCSP responses for 1 certificates before exit: all attempts to submit purge request failed"
    );
    assert_eq!(cdn.hits(), 3, "one batch, exactly max_attempts calls");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submit_after_shutdown_is_refused() {
    let cdn = spawn_fake_cdn(CdnMode::Accept);
    let running = start_purger(purger_config(&cdn, 10, 1));
    let service = running.purger.service().clone();

    running.shutdown_tx.send(()).unwrap();
    let report = timeout(RUN_TIMEOUT, running.handle).await.unwrap().unwrap();
    assert_eq!(report.total_accepted, 0);

    let len_before = service.queue().len();
    let err = service
        .submit_purge(
            vec!["http://ocsp.example.com/late".to_string()],
            &tokio_util::sync::CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, ocsp_purger::IntakeError::ShuttingDown);
    assert_eq!(service.queue().len(), len_before);
    assert_eq!(cdn.hits(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hanging_cdn_is_cut_off_at_the_deadline() {
    let cdn = spawn_fake_cdn(CdnMode::Hang);
    let mut config = purger_config(&cdn, 10, 2);
    // attempts outlive the drain deadline
    config.retry.attempt_timeout_ms = 10_000;
    let running = start_purger(config);
    let http = reqwest::Client::new();

    for i in 0..4 {
        let url = format!("http://ocsp.example.com/hang-{i}");
        let (status, _) = post_purge(&http, &running.purge_url(), &[url.as_str()]).await;
        assert_eq!(status, 200);
    }

    let started = Instant::now();
    running.shutdown_tx.send(()).unwrap();
    let report = timeout(RUN_TIMEOUT, running.handle).await.unwrap().unwrap();
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(DRAIN_DEADLINE_MS) + Duration::from_secs(1),
        "drain took {elapsed:?}"
    );
    assert_eq!(report.outcome, DrainOutcome::TimedOut);
    assert_eq!(report.total_accepted, 4);
    assert_eq!(report.purged + report.failed, report.total_accepted);
    assert_eq!(report.purged, 0);
    assert_ne!(report.exit_code(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejecting_intake_returns_429_when_full() {
    let cdn = spawn_fake_cdn(CdnMode::Hang);
    let mut config = purger_config(&cdn, 2, 1);
    config.queue.intake_mode = ocsp_purger::IntakeMode::Rejecting;
    config.retry.attempt_timeout_ms = 10_000;
    let running = start_purger(config);
    let http = reqwest::Client::new();

    // one batch held by the worker, two buffered, the next one bounces
    let mut statuses = Vec::new();
    for i in 0..3 {
        let url = format!("http://ocsp.example.com/fill-{i}");
        statuses.push(post_purge(&http, &running.purge_url(), &[url.as_str()]).await.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let (status, body) = post_purge(&http, &running.purge_url(), &["http://ocsp.example.com/over"]).await;

    assert_eq!(statuses, vec![200, 200, 200]);
    assert_eq!(status, 429, "{body}");
    assert_eq!(body["accepted"], false);

    running.shutdown_tx.send(()).unwrap();
    let report = timeout(RUN_TIMEOUT, running.handle).await.unwrap().unwrap();
    assert_eq!(report.total_accepted, 3);
    assert_eq!(report.purged + report.failed, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_request_is_bad_request() {
    let cdn = spawn_fake_cdn(CdnMode::Accept);
    let running = start_purger(purger_config(&cdn, 10, 1));
    let http = reqwest::Client::new();

    let (status, body) = post_purge(&http, &running.purge_url(), &[]).await;
    assert_eq!(status, 400);
    assert_eq!(body["accepted"], false);

    running.shutdown_tx.send(()).unwrap();
    let report = timeout(RUN_TIMEOUT, running.handle).await.unwrap().unwrap();
    assert_eq!(report.total_accepted, 0);
    assert_eq!(report.exit_code(), 0);
}
