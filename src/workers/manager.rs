//! Worker lifecycle manager.
//!
//! # Responsibilities
//! - Own the ordered registry of named workers and their runtime state
//! - Warm dependencies, then start enabled workers in registration order
//! - Roll back already-started workers, in reverse, when one fails
//! - Stop every running worker on shutdown, tolerating individual failures
//! - Serve cached worker telemetry
//! - Apply configuration changes without restarting running workers
//!
//! # Design Decisions
//! - One async mutex serializes start, stop, restart and reconfiguration,
//!   so the started stack always reflects real start order
//! - A config change never restarts a running worker: the worker is handed
//!   the new settings and adopts them on its own next cycle, or on the next
//!   explicit `restart_worker` / stop-start cycle
//! - Each `stop()` is bounded by the stop timeout; a worker that overruns is
//!   marked stopped and reported with the timeout as its error

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{ConfigSubscription, WorkerSettings, WorkersConfig};
use crate::dependencies::{Dependency, Readiness};
use crate::error::SupervisorError;
use crate::health::RuntimeHealthRegistry;
use crate::workers::contract::{StopReason, Worker, WorkerStartOptions, WorkerStopOptions};
use crate::workers::state::{WorkerDescriptor, WorkerRuntimeState, WorkerStatus};
use crate::workers::telemetry::{TelemetryCache, WorkerTelemetry};

const DEFAULT_TELEMETRY_TTL: Duration = Duration::from_secs(5);
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-worker outcome of [`WorkerManager::start_background_workers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStartResult {
    pub name: String,
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WorkerStartResult {
    pub fn started(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started: true,
            reason: None,
        }
    }

    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started: false,
            reason: Some("disabled".to_string()),
        }
    }

    fn already_running(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started: true,
            reason: Some("already_running".to_string()),
        }
    }
}

/// Per-worker outcome of a stop attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStopResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct WorkerSlot {
    descriptor: WorkerDescriptor,
    defaults: WorkerSettings,
    worker: Arc<dyn Worker>,
    state: WorkerRuntimeState,
}

struct ManagerState {
    auto_start: bool,
    slots: Vec<WorkerSlot>,
    /// Slot indices in the order their `start()` succeeded.
    started: Vec<usize>,
    /// Dependency indices in the order they were warmed.
    warmed: Vec<usize>,
}

/// Builder for [`WorkerManager`].
pub struct WorkerManagerBuilder {
    health: Arc<RuntimeHealthRegistry>,
    registrations: Vec<(String, Arc<dyn Worker>, WorkerSettings)>,
    dependencies: Vec<Arc<dyn Dependency>>,
    telemetry_ttl: Duration,
    stop_timeout: Duration,
}

impl WorkerManagerBuilder {
    /// Register a worker. Registration order is start order.
    pub fn register(self, name: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        self.register_with_defaults(name, worker, WorkerSettings::default())
    }

    /// Register a worker with settings used when the config has no entry for it.
    pub fn register_with_defaults(
        mut self,
        name: impl Into<String>,
        worker: Arc<dyn Worker>,
        defaults: WorkerSettings,
    ) -> Self {
        self.registrations.push((name.into(), worker, defaults));
        self
    }

    /// Add a dependency warmed before any worker starts.
    pub fn dependency(mut self, dependency: Arc<dyn Dependency>) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn telemetry_ttl(mut self, ttl: Duration) -> Self {
        self.telemetry_ttl = ttl;
        self
    }

    /// Upper bound on a single worker's `stop()`, during rollback and shutdown.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Build against the current worker configuration.
    pub fn build(self, config: &WorkersConfig) -> Result<WorkerManager, SupervisorError> {
        let mut names: Vec<String> = Vec::with_capacity(self.registrations.len());
        let mut slots = Vec::with_capacity(self.registrations.len());

        for (name, worker, defaults) in self.registrations {
            if names.contains(&name) {
                return Err(SupervisorError::DuplicateWorker(name));
            }
            let settings = config.get(&name).cloned().unwrap_or_else(|| defaults.clone());
            if settings.interval_ms == 0 {
                return Err(SupervisorError::InvalidWorkerSettings {
                    name,
                    message: "interval_ms must be greater than 0".to_string(),
                });
            }
            names.push(name.clone());
            slots.push(WorkerSlot {
                state: WorkerRuntimeState::new(name.clone()),
                descriptor: WorkerDescriptor {
                    name,
                    config: settings,
                },
                defaults,
                worker,
            });
        }

        Ok(WorkerManager {
            names,
            state: Mutex::new(ManagerState {
                auto_start: config.auto_start,
                slots,
                started: Vec::new(),
                warmed: Vec::new(),
            }),
            dependencies: self.dependencies,
            health: self.health,
            telemetry: TelemetryCache::new(self.telemetry_ttl),
            stop_timeout: self.stop_timeout,
        })
    }
}

/// Owns every registered worker and sequences their lifecycle.
pub struct WorkerManager {
    names: Vec<String>,
    state: Mutex<ManagerState>,
    dependencies: Vec<Arc<dyn Dependency>>,
    health: Arc<RuntimeHealthRegistry>,
    telemetry: TelemetryCache,
    stop_timeout: Duration,
}

impl WorkerManager {
    pub fn builder(health: Arc<RuntimeHealthRegistry>) -> WorkerManagerBuilder {
        WorkerManagerBuilder {
            health,
            registrations: Vec::new(),
            dependencies: Vec::new(),
            telemetry_ttl: DEFAULT_TELEMETRY_TTL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Warm dependencies, then start every enabled worker in registration order.
    ///
    /// If a worker fails, the workers started before it are stopped in reverse
    /// order and the failure is returned annotated with the worker's name.
    pub async fn start_background_workers(&self) -> Result<Vec<WorkerStartResult>, SupervisorError> {
        let mut state = self.state.lock().await;
        self.warm_dependencies(&mut state).await?;

        let mut results = Vec::with_capacity(state.slots.len());
        for index in 0..state.slots.len() {
            let auto_start = state.auto_start;
            let slot = &mut state.slots[index];
            let name = slot.descriptor.name.clone();

            if slot.state.status() == WorkerStatus::Healthy {
                results.push(WorkerStartResult::already_running(&name));
                continue;
            }

            if !(auto_start && slot.descriptor.config.enabled) {
                slot.state.mark_disabled()?;
                self.health.mark_worker_stopped(&name, disabled_detail(auto_start));
                tracing::info!(worker = %name, "Worker disabled, not starting");
                results.push(WorkerStartResult::disabled(&name));
                continue;
            }

            if let Err(err) = self.start_slot(slot).await {
                self.rollback(&mut state).await;
                let slot = &mut state.slots[index];
                if slot.state.status() == WorkerStatus::Failed {
                    let _ = slot.state.mark_stopped();
                }
                return Err(err);
            }

            state.started.push(index);
            results.push(WorkerStartResult::started(&name));
        }

        Ok(results)
    }

    /// Stop every running worker, most recently started first.
    ///
    /// Always completes; individual stop failures are logged and reported.
    pub async fn stop_background_workers(&self) -> Vec<WorkerStopResult> {
        let mut state = self.state.lock().await;

        let mut order: Vec<usize> = state.started.drain(..).rev().collect();
        for (index, slot) in state.slots.iter().enumerate() {
            if slot.state.status() == WorkerStatus::Healthy && !order.contains(&index) {
                order.push(index);
            }
        }

        let mut results = Vec::with_capacity(order.len());
        for index in order {
            results.push(self.stop_slot(&mut state.slots[index], StopReason::Shutdown).await);
        }

        self.release_dependencies(&mut state).await;

        tracing::info!(
            stopped = results.len(),
            failed = results.iter().filter(|r| r.error.is_some()).count(),
            "Background workers stopped"
        );
        results
    }

    /// Snapshot metrics from every healthy worker, in registration order.
    ///
    /// Snapshots younger than the cache TTL are reused unless `force_refresh`.
    pub async fn collect_worker_telemetry(&self, force_refresh: bool) -> Vec<WorkerTelemetry> {
        let running: Vec<(String, Arc<dyn Worker>)> = {
            let state = self.state.lock().await;
            state
                .slots
                .iter()
                .filter(|s| s.state.status() == WorkerStatus::Healthy)
                .map(|s| (s.descriptor.name.clone(), Arc::clone(&s.worker)))
                .collect()
        };

        let mut telemetry = Vec::with_capacity(running.len());
        let mut fetched = Vec::new();

        for (name, worker) in running {
            if !force_refresh {
                if let Some(metrics) = self.telemetry.get_fresh(&name) {
                    telemetry.push(WorkerTelemetry { name, metrics });
                    continue;
                }
            }

            let metrics = match worker.snapshot().await {
                Ok(metrics) => {
                    let metrics = metrics.unwrap_or(Value::Null);
                    self.telemetry.store(&name, metrics.clone());
                    fetched.push((name.clone(), metrics.clone()));
                    metrics
                }
                Err(e) => {
                    tracing::warn!(worker = %name, error = %e, "Worker snapshot failed");
                    json!({ "error": e.to_string() })
                }
            };
            telemetry.push(WorkerTelemetry { name, metrics });
        }

        if !fetched.is_empty() {
            let now = SystemTime::now();
            let mut state = self.state.lock().await;
            for (name, metrics) in fetched {
                if let Some(slot) = state
                    .slots
                    .iter_mut()
                    .find(|s| s.descriptor.name == name && s.state.status() == WorkerStatus::Healthy)
                {
                    slot.state.record_telemetry(metrics, now);
                }
            }
        }

        telemetry
    }

    /// All registered worker names, in registration order.
    pub fn get_registered_workers(&self) -> Vec<String> {
        self.names.clone()
    }

    pub async fn worker_state(&self, name: &str) -> Option<WorkerRuntimeState> {
        let state = self.state.lock().await;
        state
            .slots
            .iter()
            .find(|s| s.descriptor.name == name)
            .map(|s| s.state.clone())
    }

    pub async fn worker_states(&self) -> Vec<WorkerRuntimeState> {
        let state = self.state.lock().await;
        state.slots.iter().map(|s| s.state.clone()).collect()
    }

    pub async fn descriptor(&self, name: &str) -> Option<WorkerDescriptor> {
        let state = self.state.lock().await;
        state
            .slots
            .iter()
            .find(|s| s.descriptor.name == name)
            .map(|s| s.descriptor.clone())
    }

    /// Stop a worker if it is running, then start it with its current settings.
    pub async fn restart_worker(&self, name: &str) -> Result<WorkerStartResult, SupervisorError> {
        let mut state = self.state.lock().await;
        let index = state
            .slots
            .iter()
            .position(|s| s.descriptor.name == name)
            .ok_or_else(|| SupervisorError::UnknownWorker(name.to_string()))?;

        if state.slots[index].state.status() == WorkerStatus::Healthy {
            state.started.retain(|&i| i != index);
            self.stop_slot(&mut state.slots[index], StopReason::Restart).await;
        }

        let auto_start = state.auto_start;
        let slot = &mut state.slots[index];
        if !(auto_start && slot.descriptor.config.enabled) {
            slot.state.mark_disabled()?;
            self.health.mark_worker_stopped(name, disabled_detail(auto_start));
            return Ok(WorkerStartResult::disabled(name));
        }

        if let Err(err) = self.start_slot(slot).await {
            if slot.state.status() == WorkerStatus::Failed {
                let _ = slot.state.mark_stopped();
            }
            return Err(err);
        }

        state.started.push(index);
        Ok(WorkerStartResult::started(name))
    }

    /// Update descriptors from a new worker configuration.
    ///
    /// Running workers are not restarted; they receive the new settings through
    /// [`Worker::reconfigure`] and apply them on their next cycle.
    pub async fn apply_config(&self, config: &WorkersConfig) {
        let mut state = self.state.lock().await;

        if state.auto_start != config.auto_start {
            tracing::info!(auto_start = config.auto_start, "Worker auto-start changed; applies on next start");
            state.auto_start = config.auto_start;
        }

        for slot in state.slots.iter_mut() {
            let next = config
                .get(&slot.descriptor.name)
                .cloned()
                .unwrap_or_else(|| slot.defaults.clone());
            if next == slot.descriptor.config {
                continue;
            }
            slot.descriptor.config = next;

            if slot.state.status() == WorkerStatus::Healthy {
                if let Err(e) = slot.worker.reconfigure(&slot.descriptor.config).await {
                    tracing::warn!(worker = %slot.descriptor.name, error = %e, "Worker rejected new settings");
                }
                tracing::info!(
                    worker = %slot.descriptor.name,
                    enabled = slot.descriptor.config.enabled,
                    interval_ms = slot.descriptor.config.interval_ms,
                    "Worker settings updated without restart; applied on next cycle"
                );
            } else {
                tracing::debug!(worker = %slot.descriptor.name, "Worker settings updated");
            }
        }
    }

    /// Consume configuration changes on a dedicated task.
    pub fn spawn_config_listener(self: &Arc<Self>, mut subscription: ConfigSubscription) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(config) = subscription.recv().await {
                manager.apply_config(&config.workers).await;
            }
            tracing::debug!("Config subscription closed, listener exiting");
        })
    }

    /// Re-check every dependency and refresh the health board. Never fails.
    pub async fn sync_critical_dependencies(&self) {
        for dependency in &self.dependencies {
            let name = dependency.name();
            match dependency.check().await {
                Ok(Readiness::Ready(detail)) => self.health.mark_dependency_healthy(name, detail),
                Ok(Readiness::Disabled(detail)) => self.health.mark_dependency_disabled(name, detail),
                Err(e) => {
                    tracing::warn!(dependency = %name, error = %e, "Dependency re-sync failed");
                    self.health
                        .mark_dependency_unavailable(name, json!({ "error": e.to_string() }));
                }
            }
        }
    }

    async fn start_slot(&self, slot: &mut WorkerSlot) -> Result<(), SupervisorError> {
        let name = slot.descriptor.name.clone();
        let worker = Arc::clone(&slot.worker);
        let options = WorkerStartOptions::from(&slot.descriptor.config);
        let interval_ms = slot.descriptor.config.interval_ms;

        slot.state.begin_start()?;
        let span = tracing::info_span!("worker", worker = %name);
        match worker.start(options).instrument(span).await {
            Ok(()) => {
                slot.state.mark_healthy()?;
                self.health
                    .mark_worker_healthy(&name, json!({ "intervalMs": interval_ms }));
                tracing::info!(worker = %name, interval_ms, "Worker started");
                Ok(())
            }
            Err(source) => {
                slot.state.mark_failed(source.to_string())?;
                self.health.mark_worker_failed(&name, &*source);
                tracing::error!(worker = %name, error = %source, "Worker failed to start");
                Err(SupervisorError::WorkerStart { name, source })
            }
        }
    }

    async fn stop_slot(&self, slot: &mut WorkerSlot, reason: StopReason) -> WorkerStopResult {
        let name = slot.descriptor.name.clone();
        let worker = Arc::clone(&slot.worker);
        let span = tracing::info_span!("worker", worker = %name);

        let stopping = worker.stop(WorkerStopOptions { reason }).instrument(span);
        let error = match tokio::time::timeout(self.stop_timeout, stopping).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::warn!(worker = %name, reason = reason.as_str(), error = %e, "Worker stop failed, continuing");
                Some(e.to_string())
            }
            Err(_) => {
                let timeout_ms = self.stop_timeout.as_millis() as u64;
                tracing::warn!(worker = %name, reason = reason.as_str(), timeout_ms, "Worker stop timed out, continuing");
                Some(format!("stop timed out after {timeout_ms}ms"))
            }
        };

        if let Err(e) = slot.state.mark_stopped() {
            tracing::warn!(error = %e, "Unexpected worker state during stop");
        }
        self.telemetry.invalidate(&name);
        self.health
            .mark_worker_stopped(&name, json!({ "reason": reason.as_str() }));
        tracing::info!(worker = %name, reason = reason.as_str(), "Worker stopped");

        WorkerStopResult { name, error }
    }

    /// Undo every successful start, most recent first.
    async fn rollback(&self, state: &mut ManagerState) {
        if state.started.is_empty() {
            return;
        }
        tracing::warn!(workers = state.started.len(), "Rolling back started workers");
        while let Some(index) = state.started.pop() {
            self.stop_slot(&mut state.slots[index], StopReason::Rollback).await;
        }
    }

    async fn warm_dependencies(&self, state: &mut ManagerState) -> Result<(), SupervisorError> {
        for (index, dependency) in self.dependencies.iter().enumerate() {
            if state.warmed.contains(&index) {
                continue;
            }
            let name = dependency.name().to_string();
            match dependency.warm().await {
                Ok(Readiness::Ready(detail)) => {
                    self.health.mark_dependency_healthy(&name, detail);
                    state.warmed.push(index);
                    tracing::info!(dependency = %name, "Dependency warmed");
                }
                Ok(Readiness::Disabled(detail)) => {
                    self.health.mark_dependency_disabled(&name, detail);
                    tracing::info!(dependency = %name, "Dependency disabled");
                }
                Err(source) => {
                    self.health
                        .mark_dependency_unavailable(&name, json!({ "error": source.to_string() }));
                    tracing::error!(dependency = %name, error = %source, "Dependency warmup failed");
                    self.rollback(state).await;
                    self.release_dependencies(state).await;
                    return Err(SupervisorError::DependencyWarmup { name, source });
                }
            }
        }
        Ok(())
    }

    async fn release_dependencies(&self, state: &mut ManagerState) {
        while let Some(index) = state.warmed.pop() {
            let dependency = &self.dependencies[index];
            if let Err(e) = dependency.release().await {
                tracing::warn!(dependency = %dependency.name(), error = %e, "Dependency release failed");
            }
        }
    }
}

fn disabled_detail(auto_start: bool) -> Value {
    if auto_start {
        json!({ "disabled": true })
    } else {
        json!({ "disabled": true, "autoStart": false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    use crate::error::BoxError;

    #[derive(Default)]
    struct Recorder {
        calls: StdMutex<Vec<String>>,
        fail_start: bool,
    }

    #[async_trait]
    impl Worker for Recorder {
        async fn start(&self, options: WorkerStartOptions) -> Result<(), BoxError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("start:{}", options.interval.as_millis()));
            if self.fail_start {
                return Err("boom".into());
            }
            Ok(())
        }

        async fn stop(&self, _options: WorkerStopOptions) -> Result<(), BoxError> {
            self.calls.lock().unwrap().push("stop".into());
            Ok(())
        }

        async fn reconfigure(&self, settings: &WorkerSettings) -> Result<(), BoxError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("reconfigure:{}", settings.interval_ms));
            Ok(())
        }
    }

    fn config(entries: &[(&str, WorkerSettings)]) -> WorkersConfig {
        entries
            .iter()
            .fold(WorkersConfig::default(), |c, (name, s)| c.with_worker(*name, s.clone()))
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let result = WorkerManager::builder(health)
            .register("a", Arc::new(Recorder::default()))
            .register("a", Arc::new(Recorder::default()))
            .build(&WorkersConfig::default());

        assert!(matches!(result, Err(SupervisorError::DuplicateWorker(name)) if name == "a"));
    }

    #[tokio::test]
    async fn missing_config_entry_uses_registration_defaults() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let recorder = Arc::new(Recorder::default());
        let manager = WorkerManager::builder(health)
            .register_with_defaults("a", recorder.clone(), WorkerSettings::enabled(250))
            .build(&WorkersConfig::default())
            .unwrap();

        manager.start_background_workers().await.unwrap();
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["start:250"]);
    }

    #[tokio::test]
    async fn config_change_reconfigures_without_restart() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let recorder = Arc::new(Recorder::default());
        let manager = WorkerManager::builder(health)
            .register("a", recorder.clone())
            .build(&config(&[("a", WorkerSettings::enabled(1_000))]))
            .unwrap();
        manager.start_background_workers().await.unwrap();

        manager
            .apply_config(&config(&[("a", WorkerSettings::enabled(2_000))]))
            .await;

        assert_eq!(*recorder.calls.lock().unwrap(), vec!["start:1000", "reconfigure:2000"]);
        assert_eq!(manager.descriptor("a").await.unwrap().config.interval_ms, 2_000);
        assert_eq!(
            manager.worker_state("a").await.unwrap().status(),
            WorkerStatus::Healthy
        );
    }

    #[tokio::test]
    async fn disabling_a_running_worker_does_not_stop_it() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let recorder = Arc::new(Recorder::default());
        let manager = WorkerManager::builder(health)
            .register("a", recorder.clone())
            .build(&config(&[("a", WorkerSettings::enabled(1_000))]))
            .unwrap();
        manager.start_background_workers().await.unwrap();

        manager.apply_config(&config(&[("a", WorkerSettings::disabled())])).await;

        assert!(!recorder.calls.lock().unwrap().contains(&"stop".to_string()));
        assert_eq!(
            manager.worker_state("a").await.unwrap().status(),
            WorkerStatus::Healthy
        );
    }

    #[tokio::test]
    async fn restart_applies_new_interval() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let recorder = Arc::new(Recorder::default());
        let manager = WorkerManager::builder(health)
            .register("a", recorder.clone())
            .build(&config(&[("a", WorkerSettings::enabled(1_000))]))
            .unwrap();
        manager.start_background_workers().await.unwrap();
        manager
            .apply_config(&config(&[("a", WorkerSettings::enabled(3_000))]))
            .await;

        let result = manager.restart_worker("a").await.unwrap();

        assert!(result.started);
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["start:1000", "reconfigure:3000", "stop", "start:3000"]
        );
    }

    #[tokio::test]
    async fn restart_unknown_worker_fails() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let manager = WorkerManager::builder(health)
            .build(&WorkersConfig::default())
            .unwrap();

        assert!(matches!(
            manager.restart_worker("ghost").await,
            Err(SupervisorError::UnknownWorker(_))
        ));
    }

    #[tokio::test]
    async fn failed_restart_leaves_worker_stopped() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let recorder = Arc::new(Recorder {
            fail_start: true,
            ..Recorder::default()
        });
        let manager = WorkerManager::builder(health)
            .register("a", recorder)
            .build(&WorkersConfig::default())
            .unwrap();

        assert!(manager.restart_worker("a").await.is_err());
        let state = manager.worker_state("a").await.unwrap();
        assert_eq!(state.status(), WorkerStatus::Stopped);
        assert_eq!(state.last_error(), Some("boom"));
    }

    struct Index {
        reachable: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Dependency for Index {
        fn name(&self) -> &str {
            "search"
        }

        async fn warm(&self) -> Result<Readiness, BoxError> {
            if self.reachable.load(std::sync::atomic::Ordering::SeqCst) {
                Ok(Readiness::Ready(json!({ "cluster": "green" })))
            } else {
                Err("connection reset".into())
            }
        }
    }

    #[tokio::test]
    async fn sync_marks_failing_dependency_unavailable() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let index = Arc::new(Index {
            reachable: std::sync::atomic::AtomicBool::new(true),
        });
        let manager = WorkerManager::builder(Arc::clone(&health))
            .dependency(index.clone())
            .build(&WorkersConfig::default())
            .unwrap();
        manager.start_background_workers().await.unwrap();

        index
            .reachable
            .store(false, std::sync::atomic::Ordering::SeqCst);
        manager.sync_critical_dependencies().await;

        let entry = health.dependency("search").unwrap();
        assert_eq!(entry.status, crate::health::HealthStatus::Unavailable);
        assert_eq!(entry.detail, json!({ "error": "connection reset" }));
    }

    #[tokio::test]
    async fn zero_interval_defaults_are_rejected() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let result = WorkerManager::builder(health)
            .register_with_defaults("a", Arc::new(Recorder::default()), WorkerSettings::enabled(0))
            .build(&WorkersConfig::default());

        assert!(matches!(
            result,
            Err(SupervisorError::InvalidWorkerSettings { name, .. }) if name == "a"
        ));
    }

    struct Stuck;

    #[async_trait]
    impl Worker for Stuck {
        async fn start(&self, _options: WorkerStartOptions) -> Result<(), BoxError> {
            Ok(())
        }

        async fn stop(&self, _options: WorkerStopOptions) -> Result<(), BoxError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn rollback_gives_up_on_a_stop_that_never_returns() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let failing = Arc::new(Recorder {
            fail_start: true,
            ..Recorder::default()
        });
        let manager = WorkerManager::builder(health)
            .register("stuck", Arc::new(Stuck))
            .register("b", failing)
            .stop_timeout(Duration::from_millis(50))
            .build(&WorkersConfig::default())
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), manager.start_background_workers())
            .await
            .expect("rollback should not hang");

        assert!(matches!(result, Err(SupervisorError::WorkerStart { name, .. }) if name == "b"));
        assert_eq!(
            manager.worker_state("stuck").await.unwrap().status(),
            WorkerStatus::Stopped
        );
    }

    #[tokio::test]
    async fn shutdown_reports_a_timed_out_stop() {
        let health = Arc::new(RuntimeHealthRegistry::new());
        let manager = WorkerManager::builder(health)
            .register("stuck", Arc::new(Stuck))
            .stop_timeout(Duration::from_millis(50))
            .build(&WorkersConfig::default())
            .unwrap();
        manager.start_background_workers().await.unwrap();

        let results = manager.stop_background_workers().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error.as_deref(), Some("stop timed out after 50ms"));
    }
}
