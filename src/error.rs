//! Error taxonomy for the runtime supervisor.
//!
//! # Propagation
//! - Startup errors (`Configuration`, `DependencyWarmup`, `WorkerStart`, `Listen`)
//!   travel all the way to the process entry point and terminate the process.
//! - Shutdown stage failures never surface here; they are captured in a
//!   [`ShutdownReport`](crate::lifecycle::shutdown::ShutdownReport) instead.
//! - A duplicate `start()` is a warning, not an error.

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Error type returned by external collaborators (workers, dependencies,
/// database, socket layer, audit sink).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while starting or reconfiguring the runtime.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Runtime configuration was malformed. Nothing has started yet.
    #[error("invalid runtime configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// A dependency (database, search index) could not be warmed.
    #[error("dependency `{name}` failed to warm up: {source}")]
    DependencyWarmup {
        name: String,
        #[source]
        source: BoxError,
    },

    /// A worker's `start()` failed. Previously started workers were already
    /// rolled back when this is returned.
    #[error("worker `{name}` failed to start: {source}")]
    WorkerStart {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The HTTP listener could not be bound.
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No worker is registered under the given name.
    #[error("unknown worker `{0}`")]
    UnknownWorker(String),

    /// Two workers were registered under the same name.
    #[error("worker `{0}` is registered more than once")]
    DuplicateWorker(String),

    /// Effective settings of a worker are unusable (e.g. a zero interval).
    #[error("worker `{name}` has invalid settings: {message}")]
    InvalidWorkerSettings { name: String, message: String },

    /// A worker state change that the state machine does not allow.
    #[error("worker `{name}` cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: &'static str,
        to: &'static str,
    },
}

impl SupervisorError {
    /// Name of the worker or dependency the error is about, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            SupervisorError::DependencyWarmup { name, .. }
            | SupervisorError::WorkerStart { name, .. }
            | SupervisorError::InvalidWorkerSettings { name, .. }
            | SupervisorError::InvalidTransition { name, .. } => Some(name),
            SupervisorError::UnknownWorker(name) | SupervisorError::DuplicateWorker(name) => {
                Some(name)
            }
            _ => None,
        }
    }
}
