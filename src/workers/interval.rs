//! Fixed-interval worker driver.
//!
//! [`IntervalWorker`] turns a [`Job`] into a [`Worker`]: it runs one cycle
//! immediately on start, then one cycle per interval until stopped. Cycle
//! errors are counted and logged; they never stop the loop. Stopping cancels
//! a cycle that is still running.
//!
//! The interval is re-read before every sleep, so [`Worker::reconfigure`]
//! takes effect on the next cycle without a restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::WorkerSettings;
use crate::error::BoxError;
use crate::lifecycle::Shutdown;
use crate::workers::contract::{Worker, WorkerStartOptions, WorkerStopOptions};

/// One unit of recurring work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Apply worker-specific settings. Called before the first cycle and on reconfigure.
    async fn prepare(&self, _settings: &Map<String, Value>) -> Result<(), BoxError> {
        Ok(())
    }

    async fn run_cycle(&self) -> Result<(), BoxError>;

    /// Job-specific metrics merged into the worker snapshot.
    fn metrics(&self) -> Map<String, Value> {
        Map::new()
    }
}

#[derive(Default)]
struct CycleStats {
    cycles: AtomicU64,
    failures: AtomicU64,
    last_cycle_at_ms: AtomicU64,
    last_error: std::sync::Mutex<Option<String>>,
}

impl CycleStats {
    fn record(&self, result: &Result<(), BoxError>) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_at_ms.store(now_millis(), Ordering::Relaxed);
        if let Err(e) = result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut last) = self.last_error.lock() {
                *last = Some(e.to_string());
            }
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }
}

struct RunningLoop {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

/// Drives a [`Job`] on a timer.
pub struct IntervalWorker<J> {
    name: String,
    job: Arc<J>,
    interval_ms: Arc<AtomicU64>,
    stats: Arc<CycleStats>,
    running: Mutex<Option<RunningLoop>>,
}

impl<J: Job> IntervalWorker<J> {
    pub fn new(name: impl Into<String>, job: J) -> Self {
        Self {
            name: name.into(),
            job: Arc::new(job),
            interval_ms: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(CycleStats::default()),
            running: Mutex::new(None),
        }
    }

    pub fn job(&self) -> &Arc<J> {
        &self.job
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    pub fn cycles(&self) -> u64 {
        self.stats.cycles.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<J: Job> Worker for IntervalWorker<J> {
    async fn start(&self, options: WorkerStartOptions) -> Result<(), BoxError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(format!("{} is already running", self.name).into());
        }

        self.job.prepare(&options.settings).await?;
        self.interval_ms
            .store(options.interval.as_millis() as u64, Ordering::Relaxed);

        let shutdown = Shutdown::new();
        let stopped = shutdown.subscribe().wait();
        let job = Arc::clone(&self.job);
        let interval_ms = Arc::clone(&self.interval_ms);
        let stats = Arc::clone(&self.stats);
        let span = tracing::info_span!("cycle_loop", worker = %self.name);

        let task = tokio::spawn(
            async move {
                tokio::pin!(stopped);
                loop {
                    // A cycle in flight is abandoned on stop.
                    let result = tokio::select! {
                        _ = &mut stopped => break,
                        result = job.run_cycle() => result,
                    };
                    if let Err(e) = &result {
                        tracing::warn!(error = %e, "Cycle failed");
                    }
                    stats.record(&result);

                    let period = Duration::from_millis(interval_ms.load(Ordering::Relaxed));
                    tokio::select! {
                        _ = &mut stopped => break,
                        _ = tokio::time::sleep(period) => {}
                    }
                }
                tracing::debug!("Cycle loop exited");
            }
            .instrument(span),
        );

        *running = Some(RunningLoop { shutdown, task });
        Ok(())
    }

    async fn stop(&self, _options: WorkerStopOptions) -> Result<(), BoxError> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };
        running.shutdown.trigger();
        running.task.await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Option<Value>, BoxError> {
        let mut metrics = Map::new();
        metrics.insert("cycles".into(), json!(self.stats.cycles.load(Ordering::Relaxed)));
        metrics.insert("failures".into(), json!(self.stats.failures.load(Ordering::Relaxed)));
        metrics.insert("lastError".into(), json!(self.stats.last_error()));
        let last_cycle_at = self.stats.last_cycle_at_ms.load(Ordering::Relaxed);
        metrics.insert(
            "lastCycleAt".into(),
            if last_cycle_at == 0 { Value::Null } else { json!(last_cycle_at) },
        );
        metrics.insert("intervalMs".into(), json!(self.interval_ms.load(Ordering::Relaxed)));
        metrics.extend(self.job.metrics());
        Ok(Some(Value::Object(metrics)))
    }

    async fn reconfigure(&self, settings: &WorkerSettings) -> Result<(), BoxError> {
        self.interval_ms.store(settings.interval_ms, Ordering::Relaxed);
        self.job.prepare(&settings.extra).await
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::contract::StopReason;

    #[derive(Default)]
    struct Counter {
        runs: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl Job for Counter {
        async fn run_cycle(&self) -> Result<(), BoxError> {
            self.runs.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err("feed down".into());
            }
            Ok(())
        }
    }

    fn options(ms: u64) -> WorkerStartOptions {
        WorkerStartOptions::from(&WorkerSettings::enabled(ms))
    }

    fn stop() -> WorkerStopOptions {
        WorkerStopOptions {
            reason: StopReason::Shutdown,
        }
    }

    #[tokio::test]
    async fn runs_first_cycle_immediately_and_stops() {
        let worker = IntervalWorker::new("counter", Counter::default());
        worker.start(options(60_000)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(worker.cycles(), 1);
        tokio::time::timeout(Duration::from_secs(1), worker.stop(stop()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let worker = IntervalWorker::new("counter", Counter::default());
        worker.start(options(60_000)).await.unwrap();
        assert!(worker.start(options(60_000)).await.is_err());
        worker.stop(stop()).await.unwrap();
    }

    #[tokio::test]
    async fn cycle_failures_are_counted_not_fatal() {
        let worker = IntervalWorker::new(
            "counter",
            Counter {
                fail: true,
                ..Counter::default()
            },
        );
        worker.start(options(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        worker.stop(stop()).await.unwrap();

        let snapshot = worker.snapshot().await.unwrap().unwrap();
        assert!(snapshot["failures"].as_u64().unwrap() >= 2);
        assert_eq!(snapshot["lastError"], json!("feed down"));
    }

    #[tokio::test]
    async fn reconfigure_changes_interval_in_place() {
        let worker = IntervalWorker::new("counter", Counter::default());
        worker.start(options(60_000)).await.unwrap();
        worker
            .reconfigure(&WorkerSettings::enabled(1_000))
            .await
            .unwrap();

        assert_eq!(worker.interval(), Duration::from_secs(1));
        worker.stop(stop()).await.unwrap();
    }

    struct Hanging;

    #[async_trait]
    impl Job for Hanging {
        async fn run_cycle(&self) -> Result<(), BoxError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_cancels_a_cycle_in_flight() {
        let worker = IntervalWorker::new("hanging", Hanging);
        worker.start(options(60_000)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), worker.stop(stop()))
            .await
            .expect("stop waited for the running cycle")
            .unwrap();
        assert_eq!(worker.cycles(), 0);
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let worker = IntervalWorker::new("counter", Counter::default());
        worker.stop(stop()).await.unwrap();
    }
}
