//! Shared fakes for the integration tests.
//!
//! Every fake appends to one [`CallLog`] so tests can assert cross-component
//! ordering (rollback order, shutdown stage order).

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};

use platform_runtime::admin::{admin_router, AdminState};
use platform_runtime::audit::{AuditSink, SecurityEvent};
use platform_runtime::config::{HttpSettings, WorkerSettings, WorkersConfig};
use platform_runtime::database::Database;
use platform_runtime::dependencies::Readiness;
use platform_runtime::error::BoxError;
use platform_runtime::health::RuntimeHealthRegistry;
use platform_runtime::http::SocketServer;
use platform_runtime::lifecycle::{CoordinatorParts, HttpLifecycleCoordinator};
use platform_runtime::workers::{Worker, WorkerManager, WorkerStartOptions, WorkerStopOptions};

/// Ordered record of every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

pub struct RecordingWorker {
    name: String,
    log: CallLog,
    start_error: Option<String>,
    stop_error: Option<String>,
    snapshot: Option<Value>,
    pub last_interval: Mutex<Option<Duration>>,
}

impl RecordingWorker {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            start_error: None,
            stop_error: None,
            snapshot: None,
            last_interval: Mutex::new(None),
        }
    }

    pub fn failing_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    pub fn failing_stop(mut self, message: &str) -> Self {
        self.stop_error = Some(message.to_string());
        self
    }

    pub fn with_snapshot(mut self, snapshot: Value) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

#[async_trait]
impl Worker for RecordingWorker {
    async fn start(&self, options: WorkerStartOptions) -> Result<(), BoxError> {
        self.log.push(format!("start:{}", self.name));
        *self.last_interval.lock().unwrap() = Some(options.interval);
        match &self.start_error {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }

    async fn stop(&self, options: WorkerStopOptions) -> Result<(), BoxError> {
        self.log
            .push(format!("stop:{}:{}", self.name, options.reason.as_str()));
        match &self.stop_error {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }

    async fn snapshot(&self) -> Result<Option<Value>, BoxError> {
        self.log.push(format!("snapshot:{}", self.name));
        Ok(self.snapshot.clone())
    }
}

#[derive(Default)]
pub struct FakeDatabase {
    log: CallLog,
    fail_warm: bool,
    fail_drain: bool,
    pub warm_count: AtomicUsize,
}

impl FakeDatabase {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Self::default()
        }
    }

    pub fn failing_warm(mut self) -> Self {
        self.fail_warm = true;
        self
    }

    pub fn failing_drain(mut self) -> Self {
        self.fail_drain = true;
        self
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn warm_connections(&self) -> Result<Readiness, BoxError> {
        self.log.push("database.warm");
        self.warm_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_warm {
            return Err("connection refused".into());
        }
        Ok(Readiness::Ready(json!({ "pool": "fake" })))
    }

    async fn bootstrap(&self) -> Result<Readiness, BoxError> {
        self.log.push("database.bootstrap");
        Ok(Readiness::Ready(json!({ "migrations": "ok" })))
    }

    async fn drain_connections(&self) -> Result<(), BoxError> {
        self.log.push("database.drain");
        if self.fail_drain {
            return Err("drain stuck".into());
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.log.push("database.shutdown");
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSocket {
    log: CallLog,
    pub attaches: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl FakeSocket {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SocketServer for FakeSocket {
    fn attach(&self, router: Router) -> Router {
        self.log.push("socket.attach");
        self.attaches.fetch_add(1, Ordering::SeqCst);
        router
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.log.push("socket.shutdown");
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<String>>,
}

impl RecordingAudit {
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, event: &SecurityEvent) -> Result<(), BoxError> {
        self.events.lock().unwrap().push(event.event_type.clone());
        Ok(())
    }
}

pub fn http_settings() -> HttpSettings {
    HttpSettings {
        bind_host: "127.0.0.1".to_string(),
        shutdown_grace_ms: 1_000,
        stage_timeout_ms: 2_000,
        ..HttpSettings::default()
    }
}

pub fn workers_config(entries: &[(&str, WorkerSettings)]) -> WorkersConfig {
    entries
        .iter()
        .fold(WorkersConfig::default(), |config, (name, settings)| {
            config.with_worker(*name, settings.clone())
        })
}

/// Coordinator wired to fakes.
pub struct Harness {
    pub log: CallLog,
    pub health: Arc<RuntimeHealthRegistry>,
    pub workers: Arc<WorkerManager>,
    pub database: Arc<FakeDatabase>,
    pub socket: Arc<FakeSocket>,
    pub audit: Arc<RecordingAudit>,
    pub coordinator: HttpLifecycleCoordinator,
}

pub struct HarnessBuilder {
    log: CallLog,
    workers: Vec<(String, Arc<dyn Worker>)>,
    config: WorkersConfig,
    database: Option<FakeDatabase>,
    routes: Router,
    admin_key: Option<String>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            workers: Vec::new(),
            config: WorkersConfig::default(),
            database: None,
            routes: Router::new(),
            admin_key: None,
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn worker(mut self, name: &str, worker: RecordingWorker) -> Self {
        self.workers.push((name.to_string(), Arc::new(worker)));
        self
    }

    pub fn config(mut self, config: WorkersConfig) -> Self {
        self.config = config;
        self
    }

    pub fn database(mut self, database: FakeDatabase) -> Self {
        self.database = Some(database);
        self
    }

    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = routes;
        self
    }

    /// Mount the admin routes behind `key`.
    pub fn admin_key(mut self, key: &str) -> Self {
        self.admin_key = Some(key.to_string());
        self
    }

    pub fn build(self) -> Harness {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let mut manager = WorkerManager::builder(Arc::clone(&health));
        for (name, worker) in self.workers {
            manager = manager.register(name, worker);
        }
        let workers = Arc::new(manager.build(&self.config).unwrap());
        let database = Arc::new(self.database.unwrap_or_else(|| FakeDatabase::new(&self.log)));
        let socket = Arc::new(FakeSocket::new(&self.log));
        let audit = Arc::new(RecordingAudit::default());

        let mut routes = self.routes;
        if let Some(key) = self.admin_key {
            routes = routes.merge(admin_router(AdminState {
                health: Arc::clone(&health),
                workers: Arc::clone(&workers),
                api_key: Arc::from(key.as_str()),
            }));
        }

        let coordinator = HttpLifecycleCoordinator::new(CoordinatorParts {
            settings: http_settings(),
            health: Arc::clone(&health),
            workers: Arc::clone(&workers),
            database: database.clone(),
            socket: socket.clone(),
            audit: audit.clone(),
            routes,
        });

        Harness {
            log: self.log,
            health,
            workers,
            database,
            socket,
            audit,
            coordinator,
        }
    }
}
