use crate::config::ProcessConfig;
use crate::simulation::{simulate_work, WorkReport};
use crate::startup::AppState;
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
};
use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Runs the simulated filter for the requested `duration` (milliseconds).
///
/// Never fails: a missing or malformed duration falls back to the configured
/// default, and zero or negative durations return immediately.
pub async fn process_image(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let start = Instant::now();
    let duration_ms = effective_duration(query.as_deref(), &state.process);

    let report = tokio::task::spawn_blocking(move || simulate_work(duration_ms))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Simulated work did not complete");
            WorkReport {
                pixels: 0,
                elapsed: start.elapsed(),
            }
        });
    let elapsed = start.elapsed();

    counter!("image_processing_requests_total").increment(1);
    counter!("image_processing_pixels_total").increment(report.pixels);
    histogram!("image_processing_duration_seconds").record(elapsed.as_secs_f64());

    tracing::debug!(
        duration_ms,
        pixels = report.pixels,
        elapsed_ms = elapsed.as_millis() as u64,
        "Image processed"
    );

    (
        StatusCode::OK,
        format!(
            "Image processed successfully. Filter applied to {} pixels in {}",
            report.pixels,
            render_elapsed(elapsed)
        ),
    )
}

/// Resolves the duration to burn, applying the optional cap.
pub fn effective_duration(query: Option<&str>, config: &ProcessConfig) -> i64 {
    let requested = parse_duration(query).unwrap_or(config.default_duration_ms);
    match config.max_duration_ms {
        Some(max) if requested > max => {
            tracing::warn!(
                requested_ms = requested,
                max_ms = max,
                "Requested duration exceeds cap; clamping"
            );
            max
        }
        _ => requested,
    }
}

/// Compact duration text: `830µs`, `50.0123ms` and `1.2s` below a minute,
/// then hour/minute/second parts such as `1m5.2s` or `2h0m3s`.
pub fn render_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    if total_secs < 60 {
        return format!("{:?}", elapsed);
    }

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let nanos = elapsed.subsec_nanos();

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    out.push_str(&format!("{}m{}", minutes, seconds));
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out.push('s');
    out
}

/// First `duration` value in the query string, if it is a signed integer.
pub fn parse_duration(query: Option<&str>) -> Option<i64> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query?).ok()?;
    let (_, value) = pairs.into_iter().find(|(key, _)| key == "duration")?;
    value.parse().ok()
}
