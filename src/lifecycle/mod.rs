//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (coordinator.rs, startup.rs):
//!     Warm DB → Bootstrap DB → Start workers → Create server
//!         → Attach socket → Listen → Mark ready → Audit
//!     Failure: unwind completed stages in reverse
//!
//! Shutdown (coordinator.rs, shutdown.rs):
//!     Mark closing → Socket → HTTP close (grace, then force)
//!         → Workers → DB drain → DB shutdown → Audit → Mark stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop()
//!     SIGHUP → config reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: dependencies first, listener last
//! - Ordered shutdown: stop accept, drain, release
//! - Every shutdown stage has a timeout and runs regardless of earlier failures

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use coordinator::{
    CoordinatorParts, HttpLifecycleCoordinator, HttpPhase, StartOptions, StopOptions,
};
pub use shutdown::{
    Shutdown, ShutdownListener, ShutdownOrchestrator, ShutdownReport, ShutdownStage, StageError,
};
pub use startup::{StartupLedger, StartupStage};
