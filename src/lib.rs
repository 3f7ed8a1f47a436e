//! Process runtime supervisor library.

pub mod admin;
pub mod audit;
pub mod config;
pub mod database;
pub mod dependencies;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod workers;

pub use config::{RuntimeConfig, RuntimeConfigProvider};
pub use error::{BoxError, SupervisorError};
pub use health::RuntimeHealthRegistry;
pub use lifecycle::{HttpLifecycleCoordinator, Shutdown, StartOptions, StopOptions};
pub use workers::{Worker, WorkerManager};
