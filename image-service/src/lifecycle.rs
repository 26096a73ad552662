//! Server lifecycle: `Starting → Serving → Draining → Stopped`.
//!
//! The first termination signal moves the service to `Draining`. The listener
//! keeps accepting for a fixed grace period so the load balancer has time to
//! deregister the instance, then stops accepting and gives in-flight requests
//! a bounded window to finish. The sequence runs once per process.

use crate::config::LifecycleConfig;
use service_core::error::AppError;
use service_core::shutdown::TerminationSignal;
use std::fmt;
use std::pin::pin;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Serving => "serving",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How the drain phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished inside the shutdown bound.
    Completed,
    /// The bound elapsed first; remaining requests were abandoned.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub signal: TerminationSignal,
    pub outcome: DrainOutcome,
}

/// The serve loop's task, as spawned by the caller.
pub type ServerTask = JoinHandle<std::io::Result<()>>;

/// Read-only view of the lifecycle, shared with request handlers.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    state: watch::Receiver<LifecycleState>,
}

impl LifecycleHandle {
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// True only while serving; false from the first signal on.
    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Serving
    }
}

pub struct Lifecycle {
    config: LifecycleConfig,
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new(config: LifecycleConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self { config, state }
    }

    pub fn handle(&self) -> LifecycleHandle {
        LifecycleHandle {
            state: self.state.subscribe(),
        }
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = %previous, to = %next, "Lifecycle transition");
    }

    /// Moves to `Stopped` after the server exited on its own.
    fn fail(
        &self,
        result: Result<std::io::Result<()>, tokio::task::JoinError>,
        message: &str,
    ) -> AppError {
        let reason = exit_reason(result);
        tracing::error!(reason = %reason, "{}", message);
        self.transition(LifecycleState::Stopped);
        AppError::ServerStopped(reason)
    }

    /// Drives the lifecycle of an already spawned server until it stops.
    ///
    /// `stop` must be wired to the server's graceful shutdown trigger.
    /// Returns an error if the server exits before the shutdown trigger, or
    /// with an error while draining.
    pub async fn run(
        self,
        mut server: ServerTask,
        stop: CancellationToken,
        mut signals: mpsc::Receiver<TerminationSignal>,
    ) -> Result<ShutdownReport, AppError> {
        self.transition(LifecycleState::Serving);

        let signal = tokio::select! {
            Some(signal) = signals.recv() => signal,
            result = &mut server => {
                return Err(self.fail(result, "Server stopped without a shutdown signal"));
            }
        };

        tracing::info!(signal = %signal, "Received signal. Initiating graceful shutdown...");
        self.transition(LifecycleState::Draining);

        let grace_period = self.config.grace_period();
        tracing::info!(
            grace_period_ms = grace_period.as_millis() as u64,
            "Waiting before shutting down server..."
        );
        let mut grace = pin!(tokio::time::sleep(grace_period));
        loop {
            tokio::select! {
                _ = &mut grace => break,
                result = &mut server => {
                    return Err(self.fail(result, "Server stopped during the grace period"));
                }
                Some(extra) = signals.recv() => ignore_repeated(extra),
            }
        }

        let shutdown_timeout = self.config.shutdown_timeout();
        tracing::info!(
            shutdown_timeout_ms = shutdown_timeout.as_millis() as u64,
            "Stopping listener and waiting for in-flight requests"
        );
        stop.cancel();

        let mut deadline = pin!(tokio::time::sleep(shutdown_timeout));
        let outcome = loop {
            tokio::select! {
                result = &mut server => {
                    if !matches!(result, Ok(Ok(()))) {
                        return Err(self.fail(result, "Server failed while draining"));
                    }
                    break DrainOutcome::Completed;
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        shutdown_timeout_ms = shutdown_timeout.as_millis() as u64,
                        "Server forced to shutdown: in-flight requests did not finish in time"
                    );
                    server.abort();
                    break DrainOutcome::TimedOut;
                }
                Some(extra) = signals.recv() => ignore_repeated(extra),
            }
        };

        self.transition(LifecycleState::Stopped);
        tracing::info!(outcome = ?outcome, "Server exiting");

        Ok(ShutdownReport { signal, outcome })
    }
}

fn ignore_repeated(signal: TerminationSignal) {
    tracing::warn!(signal = %signal, "Shutdown already in progress; ignoring signal");
}

fn exit_reason(result: Result<std::io::Result<()>, tokio::task::JoinError>) -> String {
    match result {
        Ok(Ok(())) => "serve loop returned".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    }
}
