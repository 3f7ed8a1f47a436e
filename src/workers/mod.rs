//! Background worker supervision.
//!
//! # Data Flow
//! ```text
//! RuntimeConfig.workers
//!     → WorkerManager::builder().register(..).build()
//!     → start_background_workers()
//!         → dependencies warmed (dependencies/)
//!         → Worker::start() in registration order (contract.rs)
//!         → state machine + health board updated (state.rs)
//!     → stop_background_workers() in reverse start order
//!
//! Config change → apply_config() → Worker::reconfigure(), no restart
//! ```
//!
//! # Design Decisions
//! - Workers see derived settings only, never the server or the pool
//! - A failed start rolls back every worker started before it
//! - Stop never fails as a whole; per-worker errors are reported

pub mod contract;
pub mod interval;
pub mod manager;
pub mod news_aggregation;
pub mod profile_engagement;
pub mod state;
pub mod telemetry;

pub use contract::{StopReason, Worker, WorkerStartOptions, WorkerStopOptions};
pub use interval::{IntervalWorker, Job};
pub use manager::{WorkerManager, WorkerManagerBuilder, WorkerStartResult, WorkerStopResult};
pub use news_aggregation::{NewsAggregationJob, NEWS_AGGREGATION_WORKER};
pub use profile_engagement::{
    EngagementEvent, EngagementKind, EngagementRecorder, ProfileEngagementJob,
    PROFILE_ENGAGEMENT_WORKER,
};
pub use state::{WorkerDescriptor, WorkerRuntimeState, WorkerStatus};
pub use telemetry::{TelemetryCache, WorkerTelemetry};
