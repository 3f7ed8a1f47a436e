//! Database collaborator.
//!
//! # Responsibilities
//! - Warm pooled connections before traffic is accepted
//! - Verify readiness (ping, migration state)
//! - Drain and release the pool on shutdown
//!
//! # Design Decisions
//! - Exactly one pool per process, owned by the HTTP lifecycle coordinator
//! - Workers never receive the pool

pub mod postgres;

use async_trait::async_trait;

use crate::dependencies::Readiness;
use crate::error::BoxError;

pub use postgres::PgDatabase;

pub const DATABASE_DEPENDENCY: &str = "database";

/// Lifecycle hooks of the process-wide connection pool.
#[async_trait]
pub trait Database: Send + Sync {
    /// Open and verify pooled connections.
    async fn warm_connections(&self) -> Result<Readiness, BoxError>;

    /// Readiness checks after warmup (e.g. migration verification).
    async fn bootstrap(&self) -> Result<Readiness, BoxError>;

    /// Stop handing out connections and wait for checked-out ones to return.
    async fn drain_connections(&self) -> Result<(), BoxError>;

    /// Release the pool.
    async fn shutdown(&self) -> Result<(), BoxError>;
}
