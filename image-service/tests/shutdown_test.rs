//! Graceful shutdown sequencing against a running image-service.

mod common;

use common::{pixels_in, test_config, TestApp};
use image_service::lifecycle::DrainOutcome;
use image_service::startup::Application;
use service_core::error::AppError;
use service_core::shutdown::TerminationSignal;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

#[tokio::test]
async fn listener_keeps_serving_through_the_grace_period() {
    let app = TestApp::spawn(400, 1_000).await;

    let signalled = Instant::now();
    app.send_signal(TerminationSignal::Terminate).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // New requests are still accepted while the load balancer deregisters us.
    let response = app.client().get(&app.address).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let report = app.run.await.unwrap().unwrap();
    assert_eq!(report.signal, TerminationSignal::Terminate);
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert!(signalled.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn readiness_fails_as_soon_as_shutdown_starts() {
    let app = TestApp::spawn(400, 1_000).await;
    let ready_url = format!("{}/ready", app.address);

    let before = app.client().get(&ready_url).send().await.unwrap();
    assert_eq!(before.status(), 200);

    app.send_signal(TerminationSignal::Interrupt).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let during = app.client().get(&ready_url).send().await.unwrap();
    assert_eq!(during.status(), 503);
    let body: serde_json::Value = during.json().await.unwrap();
    assert_eq!(body["error"], "Service unavailable");

    let health = app
        .client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);

    app.run.await.unwrap().unwrap();
}

#[tokio::test]
async fn new_connections_are_refused_after_shutdown() {
    let app = TestApp::spawn(50, 1_000).await;

    app.send_signal(TerminationSignal::Terminate).await;
    app.run.await.unwrap().unwrap();

    let connect = TcpStream::connect(("127.0.0.1", app.port)).await;
    assert!(connect.is_err(), "listener should be closed");
}

#[tokio::test]
async fn in_flight_request_finishes_within_the_bound() {
    let app = TestApp::spawn(100, 3_000).await;

    let in_flight = {
        let client = app.client();
        let url = format!("{}/process-image?duration=600", app.address);
        tokio::spawn(async move {
            let response = client.get(url).send().await?;
            let status = response.status();
            response.text().await.map(|body| (status, body))
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    app.send_signal(TerminationSignal::Terminate).await;

    let (status, body) = in_flight.await.unwrap().unwrap();
    assert_eq!(status, 200);
    assert!(pixels_in(&body) > 0);

    let report = app.run.await.unwrap().unwrap();
    assert_eq!(report.outcome, DrainOutcome::Completed);
}

#[tokio::test]
async fn straggler_is_abandoned_when_the_bound_elapses() {
    let app = TestApp::spawn(100, 300).await;

    let straggler = {
        let client = app.client();
        let url = format!("{}/process-image?duration=1500", app.address);
        tokio::spawn(async move { client.get(url).send().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let signalled = Instant::now();
    app.send_signal(TerminationSignal::Terminate).await;

    let report = app.run.await.unwrap().unwrap();
    let elapsed = signalled.elapsed();

    assert_eq!(report.outcome, DrainOutcome::TimedOut);
    assert!(elapsed >= Duration::from_millis(400));
    assert!(elapsed < Duration::from_millis(1_200), "took {elapsed:?}");

    straggler.abort();
}

#[tokio::test]
async fn second_signal_is_ignored_while_draining() {
    let app = TestApp::spawn(300, 1_000).await;

    let signalled = Instant::now();
    app.send_signal(TerminationSignal::Interrupt).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    app.send_signal(TerminationSignal::Terminate).await;

    let report = app.run.await.unwrap().unwrap();
    assert_eq!(report.signal, TerminationSignal::Interrupt);
    assert_eq!(report.outcome, DrainOutcome::Completed);
    assert!(signalled.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let holder = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = holder.local_addr().unwrap().port();

    let mut config = test_config(50, 1_000);
    config.common.port = port;

    let err = Application::build(config).await.err().expect("bind should fail");
    assert!(matches!(err, AppError::ListenerError(_)), "got {err:?}");
}
