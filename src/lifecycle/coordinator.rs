//! HTTP lifecycle coordinator.
//!
//! # Responsibilities
//! - Sequence startup: database, workers, server, socket, listener
//! - Sequence the mirror-image shutdown through the shutdown orchestrator
//! - Keep the process-wide HTTP phase and server handle
//! - Emit audit events for start, failed start and stop
//!
//! # State Transitions
//! ```text
//! Idle → Starting: start()
//! Starting → Ready: listener bound
//! Starting → Stopped: any startup step failed (completed steps unwound)
//! Ready → Closing: stop()
//! Closing → Stopped: every shutdown stage attempted
//! Ready/Starting + start() → same handle, warning logged
//! Idle/Stopped + stop() → marked stopped again, no stage runs
//! ```
//!
//! # Design Decisions
//! - One mutex held across the whole of start() and stop(): two sequences never interleave
//! - The listener is opened last; nothing is ever ready before workers are
//! - Shutdown stages always all run, each bounded by a timeout
//! - The server handle and the pool are never handed to workers

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::audit::{AuditLevel, AuditSink, SecurityEvent};
use crate::config::HttpSettings;
use crate::database::{Database, DATABASE_DEPENDENCY};
use crate::dependencies::Readiness;
use crate::error::{BoxError, SupervisorError};
use crate::health::RuntimeHealthRegistry;
use crate::http::{CloseOutcome, HttpServer, ServerHandle, SocketServer};
use crate::lifecycle::shutdown::{ShutdownOrchestrator, ShutdownReport, ShutdownStage};
use crate::lifecycle::startup::{StartupLedger, StartupStage};
use crate::observability::metrics;
use crate::workers::WorkerManager;

/// Extra time the HTTP close stage gets beyond the grace window.
const CLOSE_STAGE_SLACK: Duration = Duration::from_secs(1);

/// Phase of the process-wide HTTP runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpPhase {
    Idle,
    Starting,
    Ready,
    Closing,
    Stopped,
}

impl HttpPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpPhase::Idle => "idle",
            HttpPhase::Starting => "starting",
            HttpPhase::Ready => "ready",
            HttpPhase::Closing => "closing",
            HttpPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for HttpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Port to bind. Falls back to `http.port`.
    pub port: Option<u16>,
}

impl StartOptions {
    pub fn port(port: u16) -> Self {
        Self { port: Some(port) }
    }
}

type ClosedCallback = Box<dyn FnOnce(&ShutdownReport) + Send>;

pub struct StopOptions {
    pub reason: String,
    on_closed: Option<ClosedCallback>,
}

impl StopOptions {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            on_closed: None,
        }
    }

    /// Invoked once the server is marked stopped, including on a repeated stop.
    pub fn on_closed(mut self, callback: impl FnOnce(&ShutdownReport) + Send + 'static) -> Self {
        self.on_closed = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for StopOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopOptions")
            .field("reason", &self.reason)
            .field("on_closed", &self.on_closed.is_some())
            .finish()
    }
}

struct HttpRuntimeState {
    phase: HttpPhase,
    server: Option<Arc<ServerHandle>>,
    started_at_port: Option<u16>,
    background_sync: Option<JoinHandle<()>>,
}

/// Collaborators owned by the coordinator.
pub struct CoordinatorParts {
    pub settings: HttpSettings,
    pub health: Arc<RuntimeHealthRegistry>,
    pub workers: Arc<WorkerManager>,
    pub database: Arc<dyn Database>,
    pub socket: Arc<dyn SocketServer>,
    pub audit: Arc<dyn AuditSink>,
    /// Host routes mounted on the server.
    pub routes: Router,
}

/// Top-level start/stop sequencer for the process.
pub struct HttpLifecycleCoordinator {
    settings: HttpSettings,
    health: Arc<RuntimeHealthRegistry>,
    workers: Arc<WorkerManager>,
    database: Arc<dyn Database>,
    socket: Arc<dyn SocketServer>,
    audit: Arc<dyn AuditSink>,
    routes: Router,
    orchestrator: ShutdownOrchestrator,
    state: Mutex<HttpRuntimeState>,
    phase: watch::Sender<HttpPhase>,
}

impl HttpLifecycleCoordinator {
    pub fn new(parts: CoordinatorParts) -> Self {
        let (phase, _) = watch::channel(HttpPhase::Idle);
        Self {
            orchestrator: ShutdownOrchestrator::new(parts.settings.stage_timeout()),
            settings: parts.settings,
            health: parts.health,
            workers: parts.workers,
            database: parts.database,
            socket: parts.socket,
            audit: parts.audit,
            routes: parts.routes,
            state: Mutex::new(HttpRuntimeState {
                phase: HttpPhase::Idle,
                server: None,
                started_at_port: None,
                background_sync: None,
            }),
            phase,
        }
    }

    pub fn phase(&self) -> HttpPhase {
        *self.phase.borrow()
    }

    /// Observe phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<HttpPhase> {
        self.phase.subscribe()
    }

    pub async fn server(&self) -> Option<Arc<ServerHandle>> {
        self.state.lock().await.server.clone()
    }

    pub fn workers(&self) -> &Arc<WorkerManager> {
        &self.workers
    }

    /// Bring the runtime up and return the listening server.
    ///
    /// A call while already started returns the existing handle. On failure,
    /// every completed step is unwound before the error is returned.
    pub async fn start(&self, options: StartOptions) -> Result<Arc<ServerHandle>, SupervisorError> {
        let mut state = self.state.lock().await;

        if let (HttpPhase::Ready | HttpPhase::Starting, Some(server)) = (state.phase, &state.server) {
            tracing::warn!(
                port = state.started_at_port,
                phase = %state.phase,
                "HTTP server already started on port {}, returning existing handle",
                server.port()
            );
            return Ok(Arc::clone(server));
        }

        let port = options.port.unwrap_or(self.settings.port);
        self.set_phase(&mut state, HttpPhase::Starting);
        self.health.mark_http_server_starting(json!({ "port": port }));

        let mut ledger = StartupLedger::new();
        match self.run_startup(port, &mut ledger).await {
            Ok(server) => {
                let server = Arc::new(server);
                state.server = Some(Arc::clone(&server));
                state.started_at_port = Some(server.port());
                self.set_phase(&mut state, HttpPhase::Ready);
                self.health
                    .mark_http_server_ready(json!({ "port": server.port() }));

                let elapsed = ledger.elapsed();
                metrics::record_startup_duration(elapsed);
                tracing::info!(
                    port = server.port(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "HTTP runtime ready"
                );

                self.record_audit(
                    SecurityEvent::new("runtime.http.started", AuditLevel::Notice)
                        .with("port", server.port()),
                )
                .await;

                state.background_sync = Some(self.spawn_dependency_sync());
                Ok(server)
            }
            Err(err) => {
                tracing::error!(error = %err, completed = ?ledger.completed(), "HTTP runtime failed to start, unwinding");
                self.compensate(ledger).await;

                state.server = None;
                state.started_at_port = None;
                self.set_phase(&mut state, HttpPhase::Stopped);
                self.health.mark_http_server_stopped(json!({
                    "reason": "startup_failed",
                    "error": err.to_string(),
                }));

                self.record_audit(
                    SecurityEvent::new("runtime.http.start_failed", AuditLevel::Warning)
                        .with("port", port)
                        .with("error", err.to_string()),
                )
                .await;
                Err(err)
            }
        }
    }

    /// Tear the runtime down. Never fails; per-stage outcomes are in the report.
    pub async fn stop(&self, options: StopOptions) -> ShutdownReport {
        let StopOptions { reason, on_closed } = options;
        let mut state = self.state.lock().await;

        if matches!(state.phase, HttpPhase::Idle | HttpPhase::Stopped) {
            tracing::info!(reason = %reason, phase = %state.phase, "HTTP runtime already stopped");
            self.health.mark_http_server_stopped(json!({ "reason": reason }));
            self.set_phase(&mut state, HttpPhase::Stopped);
            let report = ShutdownReport::already_stopped(reason);
            if let Some(callback) = on_closed {
                callback(&report);
            }
            return report;
        }

        tracing::info!(reason = %reason, "HTTP runtime stopping");
        self.set_phase(&mut state, HttpPhase::Closing);
        self.health.mark_http_server_closing(json!({ "reason": reason }));

        if let Some(sync) = state.background_sync.take() {
            sync.abort();
        }
        let server = state.server.take();
        let grace = self.settings.shutdown_grace();
        let stopped_event =
            SecurityEvent::new("runtime.http.stopped", AuditLevel::Notice).with("reason", reason.as_str());

        let stages = vec![
            ShutdownStage::new("socket", self.socket.shutdown()),
            ShutdownStage::new("http", async move {
                if let Some(server) = server {
                    if server.close(grace).await == CloseOutcome::Forced {
                        tracing::warn!(port = server.port(), "HTTP connections force-closed");
                    }
                }
                Ok::<(), BoxError>(())
            })
            .with_timeout(grace + CLOSE_STAGE_SLACK),
            ShutdownStage::new("workers", async {
                let failed: Vec<String> = self
                    .workers
                    .stop_background_workers()
                    .await
                    .into_iter()
                    .filter_map(|r| r.error.map(|e| format!("{}: {}", r.name, e)))
                    .collect();
                if failed.is_empty() {
                    Ok::<(), BoxError>(())
                } else {
                    Err(failed.join("; ").into())
                }
            }),
            ShutdownStage::new("database.drain", self.database.drain_connections()),
            ShutdownStage::new("database.shutdown", self.database.shutdown()),
            ShutdownStage::new("audit", self.audit.record(&stopped_event)),
            ShutdownStage::new("health", async {
                self.health
                    .mark_http_server_stopped(json!({ "reason": reason }));
                Ok::<(), BoxError>(())
            }),
        ];

        let report = self.orchestrator.run(&reason, stages).await;

        state.started_at_port = None;
        self.set_phase(&mut state, HttpPhase::Stopped);
        tracing::info!(
            reason = %report.reason,
            failed_stages = ?report.failed_stages(),
            "HTTP runtime stopped"
        );

        if let Some(callback) = on_closed {
            callback(&report);
        }
        report
    }

    async fn run_startup(&self, port: u16, ledger: &mut StartupLedger) -> Result<ServerHandle, SupervisorError> {
        let readiness = self
            .database
            .warm_connections()
            .await
            .map_err(|source| self.database_failed(source))?;
        self.mark_database(readiness);
        ledger.record(StartupStage::DatabaseWarmed);

        let readiness = self
            .database
            .bootstrap()
            .await
            .map_err(|source| self.database_failed(source))?;
        self.mark_database(readiness);
        ledger.record(StartupStage::DatabaseBootstrapped);

        let results = self.workers.start_background_workers().await?;
        ledger.record(StartupStage::WorkersStarted);
        tracing::info!(
            started = results.iter().filter(|r| r.started).count(),
            registered = results.len(),
            "Background workers started"
        );

        let mut server = HttpServer::new(self.routes.clone(), &self.settings);
        server.attach_socket(self.socket.as_ref());
        ledger.record(StartupStage::SocketAttached);

        let handle = server.listen(port).await?;
        ledger.record(StartupStage::Listening);
        Ok(handle)
    }

    /// Undo completed startup stages, most recent first.
    async fn compensate(&self, ledger: StartupLedger) {
        for stage in ledger.unwind() {
            match stage {
                StartupStage::SocketAttached => {
                    if let Err(e) = self.socket.shutdown().await {
                        tracing::warn!(error = %e, "Socket shutdown failed during unwind");
                    }
                }
                StartupStage::WorkersStarted => {
                    self.workers.stop_background_workers().await;
                }
                StartupStage::DatabaseWarmed => {
                    if let Err(e) = self.database.drain_connections().await {
                        tracing::warn!(error = %e, "Database drain failed during unwind");
                    }
                    if let Err(e) = self.database.shutdown().await {
                        tracing::warn!(error = %e, "Database shutdown failed during unwind");
                    }
                }
                StartupStage::DatabaseBootstrapped | StartupStage::Listening => {}
            }
        }
    }

    fn database_failed(&self, source: BoxError) -> SupervisorError {
        self.health
            .mark_dependency_unavailable(DATABASE_DEPENDENCY, json!({ "error": source.to_string() }));
        SupervisorError::DependencyWarmup {
            name: DATABASE_DEPENDENCY.to_string(),
            source,
        }
    }

    fn mark_database(&self, readiness: Readiness) {
        match readiness {
            Readiness::Ready(detail) => self.health.mark_dependency_healthy(DATABASE_DEPENDENCY, detail),
            Readiness::Disabled(detail) => self.health.mark_dependency_disabled(DATABASE_DEPENDENCY, detail),
        }
    }

    fn spawn_dependency_sync(&self) -> JoinHandle<()> {
        let workers = Arc::clone(&self.workers);
        tokio::spawn(async move {
            workers.sync_critical_dependencies().await;
            tracing::debug!("Background dependency sync complete");
        })
    }

    async fn record_audit(&self, event: SecurityEvent) {
        if let Err(e) = self.audit.record(&event).await {
            tracing::warn!(event_type = %event.event_type, error = %e, "Security audit recording failed");
        }
    }

    fn set_phase(&self, state: &mut HttpRuntimeState, phase: HttpPhase) {
        state.phase = phase;
        self.phase.send_replace(phase);
        metrics::record_http_phase(phase);
    }
}

impl fmt::Debug for HttpLifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLifecycleCoordinator")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_options_carry_callback() {
        let options = StopOptions::new("tests").on_closed(|_| {});
        assert_eq!(options.reason, "tests");
        assert!(format!("{options:?}").contains("on_closed: true"));
    }

    #[test]
    fn phase_names() {
        assert_eq!(HttpPhase::Ready.to_string(), "ready");
        assert_eq!(HttpPhase::Closing.as_str(), "closing");
    }
}
