//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor, WorkerManager, coordinator produce:
//!     → logging.rs (structured log events, per-worker spans)
//!     → metrics.rs (gauges and counters mirrored from the health registry)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (no-ops when no recorder is installed)
//! - Health registry is the source of truth; metrics mirror it

pub mod logging;
pub mod metrics;
