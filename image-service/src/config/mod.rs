use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub lifecycle: LifecycleConfig,
    pub process: ProcessConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Delay between the first termination signal and stopping the listener,
    /// so the load balancer can deregister the instance.
    pub grace_period_ms: u64,
    /// Upper bound on waiting for in-flight requests once the listener stops.
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    pub default_duration_ms: i64,
    /// Unset means unbounded.
    pub max_duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl LifecycleConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5_000,
            shutdown_timeout_ms: 15_000,
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 50,
            max_duration_ms: None,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "image-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl ImageServiceConfig {
    /// Loads configuration; every value has a default, so an empty
    /// environment yields the stock service on port 8080.
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let defaults = ImageServiceConfig::default();

        Ok(ImageServiceConfig {
            common: common_config,
            lifecycle: LifecycleConfig {
                grace_period_ms: env_or(
                    "SHUTDOWN_GRACE_PERIOD_MS",
                    defaults.lifecycle.grace_period_ms,
                )?,
                shutdown_timeout_ms: env_or(
                    "SHUTDOWN_TIMEOUT_MS",
                    defaults.lifecycle.shutdown_timeout_ms,
                )?,
            },
            process: ProcessConfig {
                default_duration_ms: env_or(
                    "PROCESS_DEFAULT_DURATION_MS",
                    defaults.process.default_duration_ms,
                )?,
                max_duration_ms: env_opt("PROCESS_MAX_DURATION_MS")?,
            },
            telemetry: TelemetryConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or(defaults.telemetry.service_name),
                log_level: env::var("LOG_LEVEL").unwrap_or(defaults.telemetry.log_level),
                otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            },
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(env_opt(key)?.unwrap_or(default))
}

fn env_opt<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => parse_value(key, &val).map(Some),
        _ => Ok(None),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}
