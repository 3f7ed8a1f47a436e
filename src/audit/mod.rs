//! Security audit recording.
//!
//! # Data Flow
//! ```text
//! HttpLifecycleCoordinator (start / stop / failed start)
//!     → SecurityEvent (type, level, attributes)
//!     → AuditSink::record
//!         → TracingAuditSink (log target `security_audit`)
//!         → JsonLinesAuditSink (append-only file)
//! ```
//!
//! # Design Decisions
//! - Separate from the health registry: the audit trail keeps every event
//! - Recording failures are logged by the caller, never fatal

pub mod sink;

pub use sink::{AuditLevel, AuditSink, JsonLinesAuditSink, SecurityEvent, TracingAuditSink};
