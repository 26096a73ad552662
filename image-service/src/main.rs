use image_service::config::ImageServiceConfig;
use image_service::lifecycle::DrainOutcome;
use image_service::services::init_metrics;
use image_service::startup::Application;
use service_core::error::AppError;
use service_core::observability::{init_tracing, shutdown_tracing};
use std::process::ExitCode;

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to build tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run());
    if let Err(e) = &result {
        tracing::error!(error = %e, "Image service terminated");
        eprintln!("image-service: {}", e);
    }

    // Flush after the last event so a fatal error still reaches the exporter.
    shutdown_tracing();
    // Requests abandoned after the shutdown bound may still be burning CPU on
    // blocking threads; exit without joining them.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ImageServiceConfig::load()?;

    init_tracing(
        &config.telemetry.service_name,
        &config.telemetry.log_level,
        config.telemetry.otlp_endpoint.as_deref(),
    );

    init_metrics()?;

    tracing::info!(
        service = %config.telemetry.service_name,
        version = env!("CARGO_PKG_VERSION"),
        port = config.common.port,
        grace_period_ms = config.lifecycle.grace_period_ms,
        shutdown_timeout_ms = config.lifecycle.shutdown_timeout_ms,
        "Starting image service"
    );

    // Install handlers before binding so an early preemption notice is not lost.
    let signals = service_core::shutdown::listen().map_err(|e| {
        AppError::InternalError(anyhow::Error::new(e).context("failed to install signal handlers"))
    })?;

    let application = Application::build(config).await?;
    let report = application.run_until_stopped(signals).await?;

    if report.outcome == DrainOutcome::TimedOut {
        tracing::warn!(signal = %report.signal, "Shutdown completed with abandoned requests");
    }
    tracing::info!(signal = %report.signal, "Service shutdown complete");
    Ok(())
}
