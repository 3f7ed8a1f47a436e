//! Profile engagement aggregation.
//!
//! Request handlers push engagement events through an [`EngagementRecorder`];
//! each cycle drains up to `batch_size` queued events and folds them into
//! per-profile counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex};

use crate::error::BoxError;
use crate::workers::interval::Job;

pub const PROFILE_ENGAGEMENT_WORKER: &str = "profileEngagement";

const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    View,
    Like,
    Share,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEvent {
    pub profile_id: String,
    pub kind: EngagementKind,
}

/// Running totals for one profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileScore {
    pub views: u64,
    pub likes: u64,
    pub shares: u64,
}

impl ProfileScore {
    /// Weighted engagement score.
    pub fn score(&self) -> u64 {
        self.views + self.likes * 3 + self.shares * 5
    }

    fn apply(&mut self, kind: EngagementKind) {
        match kind {
            EngagementKind::View => self.views += 1,
            EngagementKind::Like => self.likes += 1,
            EngagementKind::Share => self.shares += 1,
        }
    }
}

/// Cloneable handle for enqueueing events.
#[derive(Debug, Clone)]
pub struct EngagementRecorder {
    tx: mpsc::UnboundedSender<EngagementEvent>,
}

impl EngagementRecorder {
    /// Queue an event. Returns false once the job has been dropped.
    pub fn record(&self, event: EngagementEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub struct ProfileEngagementJob {
    tx: mpsc::UnboundedSender<EngagementEvent>,
    rx: Mutex<mpsc::UnboundedReceiver<EngagementEvent>>,
    batch_size: AtomicUsize,
    processed: AtomicU64,
    scores: DashMap<String, ProfileScore>,
}

impl ProfileEngagementJob {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            batch_size: AtomicUsize::new(DEFAULT_BATCH_SIZE),
            processed: AtomicU64::new(0),
            scores: DashMap::new(),
        }
    }

    pub fn recorder(&self) -> EngagementRecorder {
        EngagementRecorder {
            tx: self.tx.clone(),
        }
    }

    pub fn score(&self, profile_id: &str) -> Option<ProfileScore> {
        self.scores.get(profile_id).map(|s| *s.value())
    }
}

impl Default for ProfileEngagementJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Job for ProfileEngagementJob {
    async fn prepare(&self, settings: &Map<String, Value>) -> Result<(), BoxError> {
        if let Some(value) = settings.get("batch_size") {
            let size = value
                .as_u64()
                .filter(|n| *n > 0)
                .ok_or("batch_size must be a positive integer")?;
            self.batch_size.store(size as usize, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn run_cycle(&self) -> Result<(), BoxError> {
        let limit = self.batch_size.load(Ordering::Relaxed);
        let mut rx = self.rx.lock().await;

        let mut drained = 0usize;
        while drained < limit {
            let Ok(event) = rx.try_recv() else { break };
            self.scores
                .entry(event.profile_id)
                .or_default()
                .apply(event.kind);
            drained += 1;
        }

        if drained > 0 {
            self.processed.fetch_add(drained as u64, Ordering::Relaxed);
            tracing::debug!(events = drained, "Engagement batch applied");
        }
        Ok(())
    }

    fn metrics(&self) -> Map<String, Value> {
        let top = self
            .scores
            .iter()
            .max_by_key(|entry| entry.value().score())
            .map(|entry| json!({ "profileId": entry.key(), "score": entry.value().score() }));

        let mut metrics = Map::new();
        metrics.insert("processedEvents".into(), json!(self.processed.load(Ordering::Relaxed)));
        metrics.insert("trackedProfiles".into(), json!(self.scores.len()));
        metrics.insert("batchSize".into(), json!(self.batch_size.load(Ordering::Relaxed)));
        metrics.insert("topProfile".into(), top.unwrap_or(Value::Null));
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(profile: &str, kind: EngagementKind) -> EngagementEvent {
        EngagementEvent {
            profile_id: profile.to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn cycle_folds_events_into_scores() {
        let job = ProfileEngagementJob::new();
        let recorder = job.recorder();
        recorder.record(event("p1", EngagementKind::View));
        recorder.record(event("p1", EngagementKind::Like));
        recorder.record(event("p2", EngagementKind::Share));

        job.run_cycle().await.unwrap();

        assert_eq!(
            job.score("p1"),
            Some(ProfileScore {
                views: 1,
                likes: 1,
                shares: 0
            })
        );
        assert_eq!(job.metrics()["processedEvents"], json!(3));
        assert_eq!(job.metrics()["topProfile"]["profileId"], json!("p2"));
    }

    #[tokio::test]
    async fn batch_size_bounds_one_cycle() {
        let job = ProfileEngagementJob::new();
        let mut settings = Map::new();
        settings.insert("batch_size".into(), json!(2));
        job.prepare(&settings).await.unwrap();

        let recorder = job.recorder();
        for _ in 0..5 {
            recorder.record(event("p1", EngagementKind::View));
        }

        job.run_cycle().await.unwrap();
        assert_eq!(job.score("p1").unwrap().views, 2);
        job.run_cycle().await.unwrap();
        job.run_cycle().await.unwrap();
        assert_eq!(job.score("p1").unwrap().views, 5);
    }

    #[tokio::test]
    async fn invalid_batch_size_is_rejected() {
        let job = ProfileEngagementJob::new();
        let mut settings = Map::new();
        settings.insert("batch_size".into(), json!(0));
        assert!(job.prepare(&settings).await.is_err());
    }
}
