//! Test helpers for image-service integration tests.

#![allow(dead_code)]

use image_service::config::{
    ImageServiceConfig, LifecycleConfig, ProcessConfig, TelemetryConfig,
};
use image_service::lifecycle::ShutdownReport;
use image_service::startup::Application;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use service_core::shutdown::TerminationSignal;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub signals: mpsc::Sender<TerminationSignal>,
    pub run: JoinHandle<Result<ShutdownReport, AppError>>,
}

pub fn test_config(grace_period_ms: u64, shutdown_timeout_ms: u64) -> ImageServiceConfig {
    ImageServiceConfig {
        // Use random port for testing (port 0)
        common: CoreConfig { port: 0 },
        lifecycle: LifecycleConfig {
            grace_period_ms,
            shutdown_timeout_ms,
        },
        process: ProcessConfig::default(),
        telemetry: TelemetryConfig {
            service_name: "image-service-test".to_string(),
            ..TelemetryConfig::default()
        },
    }
}

impl TestApp {
    pub async fn spawn(grace_period_ms: u64, shutdown_timeout_ms: u64) -> Self {
        Self::spawn_with(test_config(grace_period_ms, shutdown_timeout_ms)).await
    }

    pub async fn spawn_with(config: ImageServiceConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let (signals, rx) = mpsc::channel(4);

        let run = tokio::spawn(app.run_until_stopped(rx));

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            signals,
            run,
        }
    }

    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::new()
    }

    pub async fn send_signal(&self, signal: TerminationSignal) {
        self.signals
            .send(signal)
            .await
            .expect("Lifecycle stopped listening for signals");
    }

    pub async fn process_image(&self, query: &str) -> (reqwest::StatusCode, String) {
        let response = self
            .client()
            .get(format!("{}/process-image{}", self.address, query))
            .send()
            .await
            .expect("Failed to execute request");
        let status = response.status();
        let body = response.text().await.expect("Failed to read body");
        (status, body)
    }
}

/// Pulls `N` out of "... Filter applied to N pixels in ...".
pub fn pixels_in(body: &str) -> u64 {
    body.split("applied to ")
        .nth(1)
        .and_then(|rest| rest.split(' ').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("no pixel count in {body:?}"))
}

/// Pulls the reported elapsed time out of "... pixels in 50.0123ms".
pub fn elapsed_in(body: &str) -> Duration {
    let text = body
        .rsplit(" pixels in ")
        .next()
        .unwrap_or_else(|| panic!("no elapsed time in {body:?}"));
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or_else(|| panic!("no unit in {text:?}"));
    let (value, unit) = text.split_at(split);
    let value: f64 = value
        .parse()
        .unwrap_or_else(|_| panic!("bad number in {text:?}"));
    let nanos_per_unit = match unit {
        "ns" => 1.0,
        "µs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        other => panic!("unexpected unit {other:?} in {text:?}"),
    };
    Duration::from_nanos((value * nanos_per_unit).round() as u64)
}
