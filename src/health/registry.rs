//! Runtime health registry.
//!
//! A keyed, latest-value-only status board for dependencies, workers and the
//! HTTP server phase. Every `mark_*` call overwrites the entry for its key;
//! nothing is retained beyond the newest value. Consumers that want to react
//! to changes subscribe to the update feed.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::observability::metrics;

const UPDATE_FEED_CAPACITY: usize = 256;

/// Entry identity on the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum HealthKey {
    Dependency(String),
    Worker(String),
    HttpServer,
}

impl fmt::Display for HealthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthKey::Dependency(name) => write!(f, "dependency:{}", name),
            HealthKey::Worker(name) => write!(f, "worker:{}", name),
            HealthKey::HttpServer => write!(f, "http"),
        }
    }
}

/// Reported status. Dependencies use healthy/disabled/unavailable, workers
/// healthy/failed/stopped, the HTTP server starting/ready/closing/stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Disabled,
    Unavailable,
    Failed,
    Stopped,
    Starting,
    Ready,
    Closing,
}

/// Latest value recorded for a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthEntry {
    pub status: HealthStatus,
    pub detail: Value,
    #[serde(serialize_with = "serialize_millis")]
    pub updated_at: SystemTime,
}

fn serialize_millis<S: serde::Serializer>(at: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    s.serialize_u64(millis)
}

/// A single overwrite, as seen on the update feed.
#[derive(Debug, Clone)]
pub struct HealthUpdate {
    pub key: HealthKey,
    pub entry: HealthEntry,
}

/// Board contents grouped for observability consumers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthSnapshot {
    pub dependencies: BTreeMap<String, HealthEntry>,
    pub workers: BTreeMap<String, HealthEntry>,
    pub http: Option<HealthEntry>,
}

/// Process-wide status board.
pub struct RuntimeHealthRegistry {
    entries: DashMap<HealthKey, HealthEntry>,
    updates: broadcast::Sender<HealthUpdate>,
}

impl RuntimeHealthRegistry {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_FEED_CAPACITY);
        Self {
            entries: DashMap::new(),
            updates,
        }
    }

    // --- Dependencies ---

    pub fn mark_dependency_healthy(&self, name: &str, detail: Value) {
        self.set_dependency(name, HealthStatus::Healthy, detail);
    }

    pub fn mark_dependency_disabled(&self, name: &str, detail: Value) {
        self.set_dependency(name, HealthStatus::Disabled, detail);
    }

    pub fn mark_dependency_unavailable(&self, name: &str, detail: Value) {
        self.set_dependency(name, HealthStatus::Unavailable, detail);
    }

    // --- Workers ---

    pub fn mark_worker_healthy(&self, name: &str, detail: Value) {
        self.set_worker(name, HealthStatus::Healthy, detail);
    }

    pub fn mark_worker_failed(&self, name: &str, error: &(dyn std::error::Error + '_)) {
        metrics::record_worker_start_failure(name);
        self.set_worker(name, HealthStatus::Failed, json!({ "error": error.to_string() }));
    }

    pub fn mark_worker_stopped(&self, name: &str, detail: Value) {
        self.set_worker(name, HealthStatus::Stopped, detail);
    }

    // --- HTTP server ---

    pub fn mark_http_server_starting(&self, detail: Value) {
        self.set(HealthKey::HttpServer, HealthStatus::Starting, detail);
    }

    pub fn mark_http_server_ready(&self, detail: Value) {
        self.set(HealthKey::HttpServer, HealthStatus::Ready, detail);
    }

    pub fn mark_http_server_closing(&self, detail: Value) {
        self.set(HealthKey::HttpServer, HealthStatus::Closing, detail);
    }

    pub fn mark_http_server_stopped(&self, detail: Value) {
        self.set(HealthKey::HttpServer, HealthStatus::Stopped, detail);
    }

    // --- Reads ---

    pub fn get(&self, key: &HealthKey) -> Option<HealthEntry> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    pub fn dependency(&self, name: &str) -> Option<HealthEntry> {
        self.get(&HealthKey::Dependency(name.to_string()))
    }

    pub fn worker(&self, name: &str) -> Option<HealthEntry> {
        self.get(&HealthKey::Worker(name.to_string()))
    }

    pub fn http_server(&self) -> Option<HealthEntry> {
        self.get(&HealthKey::HttpServer)
    }

    /// Copy of the whole board.
    pub fn snapshot(&self) -> HealthSnapshot {
        let mut snapshot = HealthSnapshot::default();
        for r in self.entries.iter() {
            let entry = r.value().clone();
            match r.key() {
                HealthKey::Dependency(name) => {
                    snapshot.dependencies.insert(name.clone(), entry);
                }
                HealthKey::Worker(name) => {
                    snapshot.workers.insert(name.clone(), entry);
                }
                HealthKey::HttpServer => snapshot.http = Some(entry),
            }
        }
        snapshot
    }

    /// Receive every subsequent overwrite.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthUpdate> {
        self.updates.subscribe()
    }

    fn set_dependency(&self, name: &str, status: HealthStatus, detail: Value) {
        metrics::record_dependency_status(name, status);
        self.set(HealthKey::Dependency(name.to_string()), status, detail);
    }

    fn set_worker(&self, name: &str, status: HealthStatus, detail: Value) {
        metrics::record_worker_status(name, status);
        self.set(HealthKey::Worker(name.to_string()), status, detail);
    }

    fn set(&self, key: HealthKey, status: HealthStatus, detail: Value) {
        let entry = HealthEntry {
            status,
            detail,
            updated_at: SystemTime::now(),
        };
        tracing::debug!(key = %key, status = ?status, "Health updated");
        self.entries.insert(key.clone(), entry.clone());
        let _ = self.updates.send(HealthUpdate { key, entry });
    }
}

impl Default for RuntimeHealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}
