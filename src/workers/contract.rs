//! The contract every background worker implements.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::WorkerSettings;
use crate::error::BoxError;

/// Options handed to [`Worker::start`]. Workers only ever see derived
/// configuration, never the HTTP server or database pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStartOptions {
    pub interval: Duration,
    pub settings: Map<String, Value>,
}

impl From<&WorkerSettings> for WorkerStartOptions {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            interval: settings.interval(),
            settings: settings.extra.clone(),
        }
    }
}

/// Why a worker is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Undoing a partially-completed startup.
    Rollback,
    /// Process shutdown.
    Shutdown,
    /// Explicit restart of a single worker.
    Restart,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Rollback => "rollback",
            StopReason::Shutdown => "shutdown",
            StopReason::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStopOptions {
    pub reason: StopReason,
}

/// A background unit of recurring work, independent of request handling.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Begin work. Returning `Err` marks the worker failed and aborts startup.
    async fn start(&self, options: WorkerStartOptions) -> Result<(), BoxError>;

    /// Stop work. Errors are logged by the manager and otherwise ignored.
    async fn stop(&self, options: WorkerStopOptions) -> Result<(), BoxError>;

    /// Current metrics, if the worker exposes any.
    async fn snapshot(&self) -> Result<Option<Value>, BoxError> {
        Ok(None)
    }

    /// Adopt new settings without restarting. Applied on the worker's next cycle.
    async fn reconfigure(&self, _settings: &WorkerSettings) -> Result<(), BoxError> {
        Ok(())
    }
}
