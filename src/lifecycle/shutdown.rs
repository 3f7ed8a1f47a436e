//! Shutdown coordination.
//!
//! - [`Shutdown`]: a one-shot signal long-running tasks (serve loop, worker
//!   loops, socket connections) wait on.
//! - [`ShutdownOrchestrator`]: runs an ordered list of teardown stages, each
//!   bounded by a timeout. A failing or hung stage is recorded and the next
//!   stage still runs.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::watch;

use crate::error::BoxError;
use crate::observability::metrics;

/// One-shot shutdown signal.
///
/// Unlike a broadcast channel, subscribers created after `trigger()` still
/// observe the signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal. Repeated calls are harmless.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of listeners still alive.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once shutdown has been triggered (or the sender is gone).
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Why a stage did not complete cleanly.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{0}")]
    Failed(#[source] BoxError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// A named teardown step with its own deadline.
pub struct ShutdownStage<'a> {
    name: &'static str,
    timeout: Option<Duration>,
    action: BoxFuture<'a, Result<(), BoxError>>,
}

impl<'a> ShutdownStage<'a> {
    pub fn new<F>(name: &'static str, action: F) -> Self
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'a,
    {
        Self {
            name,
            timeout: None,
            action: Box::pin(action),
        }
    }

    /// Override the orchestrator's default stage timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Result of one stage.
#[derive(Debug)]
pub struct StageOutcome {
    pub stage: &'static str,
    pub elapsed: Duration,
    pub error: Option<StageError>,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-stage record of a shutdown run.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub reason: String,
    pub stages: Vec<StageOutcome>,
    /// True when the runtime was already stopped and no stage ran.
    pub already_stopped: bool,
}

impl ShutdownReport {
    pub fn already_stopped(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            stages: Vec::new(),
            already_stopped: true,
        }
    }

    /// Names of the stages in the order they ran.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.stage).collect()
    }

    pub fn failed_stages(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .filter(|s| !s.succeeded())
            .map(|s| s.stage)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.stages.iter().all(StageOutcome::succeeded)
    }
}

/// Runs teardown stages in order, isolating their failures.
#[derive(Debug, Clone)]
pub struct ShutdownOrchestrator {
    stage_timeout: Duration,
}

impl ShutdownOrchestrator {
    pub fn new(stage_timeout: Duration) -> Self {
        Self { stage_timeout }
    }

    /// Run every stage, in order, regardless of earlier outcomes.
    pub async fn run(&self, reason: &str, stages: Vec<ShutdownStage<'_>>) -> ShutdownReport {
        let mut report = ShutdownReport {
            reason: reason.to_string(),
            stages: Vec::with_capacity(stages.len()),
            already_stopped: false,
        };

        for stage in stages {
            let limit = stage.timeout.unwrap_or(self.stage_timeout);
            let started = Instant::now();
            let error = match tokio::time::timeout(limit, stage.action).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(StageError::Failed(e)),
                Err(_) => Some(StageError::TimedOut(limit)),
            };
            let elapsed = started.elapsed();

            match &error {
                None => {
                    tracing::debug!(stage = stage.name, elapsed_ms = elapsed.as_millis() as u64, "Shutdown stage complete");
                    metrics::record_shutdown_stage(stage.name, "ok");
                }
                Some(e) => {
                    tracing::error!(stage = stage.name, error = %e, "Shutdown stage failed, continuing");
                    metrics::record_shutdown_stage(stage.name, "failed");
                }
            }

            report.stages.push(StageOutcome {
                stage: stage.name,
                elapsed,
                error,
            });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn late_subscribers_see_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let listener = shutdown.subscribe();
        assert!(listener.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), listener.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let shutdown = Shutdown::new();
        let waiter = tokio::spawn(shutdown.subscribe().wait());

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn failing_stage_does_not_block_the_rest() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = ShutdownOrchestrator::new(Duration::from_secs(1));

        let log = |name: &'static str| {
            let ran = Arc::clone(&ran);
            async move {
                ran.lock().unwrap().push(name);
                Ok::<(), BoxError>(())
            }
        };

        let report = orchestrator
            .run(
                "tests",
                vec![
                    ShutdownStage::new("first", log("first")),
                    ShutdownStage::new("broken", async { Err::<(), BoxError>("boom".into()) }),
                    ShutdownStage::new("last", log("last")),
                ],
            )
            .await;

        assert_eq!(*ran.lock().unwrap(), vec!["first", "last"]);
        assert_eq!(report.stage_names(), vec!["first", "broken", "last"]);
        assert_eq!(report.failed_stages(), vec!["broken"]);
    }

    #[tokio::test]
    async fn hung_stage_times_out() {
        let orchestrator = ShutdownOrchestrator::new(Duration::from_secs(30));

        let report = orchestrator
            .run(
                "tests",
                vec![
                    ShutdownStage::new("hung", std::future::pending())
                        .with_timeout(Duration::from_millis(20)),
                    ShutdownStage::new("after", async { Ok::<(), BoxError>(()) }),
                ],
            )
            .await;

        assert!(matches!(report.stages[0].error, Some(StageError::TimedOut(_))));
        assert!(report.stages[1].succeeded());
    }
}
