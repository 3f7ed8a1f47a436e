//! Runtime status endpoints.
//!
//! # Data Flow
//! ```text
//! GET  /admin/status                 → version + HTTP health entry
//! GET  /admin/health                 → whole health board
//! GET  /admin/workers?refresh=true   → worker telemetry
//! POST /admin/workers/{name}/restart → WorkerManager::restart_worker
//!     (all behind auth.rs bearer check)
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::health::RuntimeHealthRegistry;
use crate::workers::WorkerManager;

use self::auth::admin_auth_middleware;
use self::handlers::{get_health, get_status, get_workers, restart_worker};

/// Shared state of the admin routes.
#[derive(Clone)]
pub struct AdminState {
    pub health: Arc<RuntimeHealthRegistry>,
    pub workers: Arc<WorkerManager>,
    pub api_key: Arc<str>,
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/health", get(get_health))
        .route("/admin/workers", get(get_workers))
        .route("/admin/workers/{name}/restart", post(restart_worker))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
