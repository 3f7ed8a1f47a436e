//! Short-lived cache of worker snapshots.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

/// One worker's metrics as returned by telemetry collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerTelemetry {
    pub name: String,
    pub metrics: Value,
}

struct CachedSnapshot {
    metrics: Value,
    fetched_at: Instant,
}

/// Per-worker snapshot cache with a fixed TTL.
pub struct TelemetryCache {
    ttl: Duration,
    entries: DashMap<String, CachedSnapshot>,
}

impl TelemetryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Cached metrics for `name` if younger than the TTL.
    pub fn get_fresh(&self, name: &str) -> Option<Value> {
        self.entries
            .get(name)
            .filter(|r| r.value().fetched_at.elapsed() < self.ttl)
            .map(|r| r.value().metrics.clone())
    }

    pub fn store(&self, name: &str, metrics: Value) {
        self.entries.insert(
            name.to_string(),
            CachedSnapshot {
                metrics,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, name: &str) {
        self.entries.remove(name);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
