//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Socket upgrade accepted
//!     → connection.rs (id assigned, live count incremented)
//!     → connection task runs
//!     → guard dropped, live count decremented
//!
//! Shutdown:
//!     → wait_for_idle(timeout) until the count reaches zero
//! ```

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
