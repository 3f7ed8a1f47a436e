//! Runtime health subsystem.
//!
//! # Data Flow
//! ```text
//! WorkerManager / HttpLifecycleCoordinator
//!     → mark_* calls (registry.rs)
//!     → entry overwritten (latest value only)
//!     → metrics gauges mirrored
//!     → update feed broadcast to subscribers
//!
//! Observability tooling:
//!     → snapshot() for the whole board
//!     → subscribe() for changes
//! ```
//!
//! # Design Decisions
//! - Liveness board, not an audit log: no history is kept
//! - Keyed by dependency name, worker name, or the single HTTP server
//! - Writers never block each other (concurrent map)

pub mod registry;

pub use registry::{
    HealthEntry, HealthKey, HealthSnapshot, HealthStatus, HealthUpdate, RuntimeHealthRegistry,
};
