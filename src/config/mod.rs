//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RuntimeConfig (validated, immutable)
//!     → provider.rs (ArcSwap snapshot, shared via Arc)
//!
//! On reload (file change or SIGHUP):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → provider.rs validates, swaps, broadcasts
//!     → WorkerManager consumes the change on its own task
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes replace the whole snapshot
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod provider;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use provider::{ConfigSubscription, RuntimeConfigProvider};
pub use schema::{
    AdminSettings, AuditSettings, DatabaseSettings, HttpSettings, LogFormat, ObservabilitySettings,
    RuntimeConfig, SearchSettings, SocketSettings, TelemetrySettings, WorkerSettings,
    WorkersConfig,
};
