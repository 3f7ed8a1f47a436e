//! External dependencies warmed before any worker starts.
//!
//! # Data Flow
//! ```text
//! WorkerManager::start_background_workers
//!     → Dependency::warm (registration order)
//!     → health registry: healthy / disabled / unavailable
//!     → first failure releases already-warmed dependencies in reverse and aborts
//!
//! After readiness:
//!     → Dependency::check (background re-sync, never fatal)
//! ```

pub mod search;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BoxError;

pub use search::HttpSearchIndex;

/// Outcome of a warmup or readiness check.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// Dependency is reachable; detail is recorded on the health board.
    Ready(Value),
    /// Dependency is switched off by configuration.
    Disabled(Value),
}

/// Pre-flight initialization of an external resource.
#[async_trait]
pub trait Dependency: Send + Sync {
    fn name(&self) -> &str;

    /// Open or verify the resource. An error aborts startup.
    async fn warm(&self) -> Result<Readiness, BoxError>;

    /// Re-check an already-warmed resource.
    async fn check(&self) -> Result<Readiness, BoxError> {
        self.warm().await
    }

    /// Undo `warm`. Called in reverse order during rollback and shutdown.
    async fn release(&self) -> Result<(), BoxError> {
        Ok(())
    }
}
