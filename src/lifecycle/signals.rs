//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT / SIGTERM and name the one received
//! - Reload configuration on SIGHUP
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown
//! - A reload that fails to load or validate keeps the current config

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::RuntimeConfigProvider;

/// Resolve once a termination signal arrives. Returns the signal name, used
/// as the stop reason.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal = received, "Shutdown signal received");
    received
}

/// Reload `path` into `provider` on every SIGHUP.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(path: PathBuf, provider: Arc<RuntimeConfigProvider>) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler");
                return;
            }
        };

        while hangups.recv().await.is_some() {
            tracing::info!(path = ?path, "SIGHUP received, reloading configuration");
            match load_config(&path) {
                Ok(config) => match provider.publish(config) {
                    Ok(()) => tracing::info!("Configuration reloaded"),
                    Err(e) => tracing::error!(error = %e, "Reloaded configuration rejected"),
                },
                Err(e) => tracing::error!(error = %e, "Failed to reload configuration, keeping current"),
            }
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(_path: PathBuf, _provider: Arc<RuntimeConfigProvider>) -> JoinHandle<()> {
    tokio::spawn(async {})
}
