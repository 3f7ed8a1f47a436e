//! Worker runtime state machine.
//!
//! # State Transitions
//! ```text
//! Stopped → Starting: start requested and worker enabled
//! Starting → Healthy: start() returned Ok
//! Starting → Failed: start() returned Err
//! Healthy → Stopped: explicit stop or rollback
//! Failed → Stopped: cleanup after rollback
//! Stopped → Stopped (disabled): config says enabled=false, start() never called
//! ```

use std::fmt;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;

use crate::config::WorkerSettings;
use crate::error::SupervisorError;

/// Lifecycle status of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Stopped,
    Starting,
    Healthy,
    Failed,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Starting => "starting",
            WorkerStatus::Healthy => "healthy",
            WorkerStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity plus live configuration of a registered worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerDescriptor {
    pub name: String,
    pub config: WorkerSettings,
}

/// Runtime state of one worker. Only changed through the transition methods.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerRuntimeState {
    name: String,
    status: WorkerStatus,
    disabled: bool,
    last_error: Option<String>,
    #[serde(skip)]
    started_at: Option<SystemTime>,
    last_telemetry: Option<Value>,
    #[serde(skip)]
    telemetry_fetched_at: Option<SystemTime>,
}

impl WorkerRuntimeState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: WorkerStatus::Stopped,
            disabled: false,
            last_error: None,
            started_at: None,
            last_telemetry: None,
            telemetry_fetched_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    /// True when the worker was skipped because its config disabled it.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn last_telemetry(&self) -> Option<&Value> {
        self.last_telemetry.as_ref()
    }

    pub fn telemetry_fetched_at(&self) -> Option<SystemTime> {
        self.telemetry_fetched_at
    }

    pub fn begin_start(&mut self) -> Result<(), SupervisorError> {
        self.transition(WorkerStatus::Stopped, WorkerStatus::Starting)?;
        self.disabled = false;
        Ok(())
    }

    pub fn mark_healthy(&mut self) -> Result<(), SupervisorError> {
        self.transition(WorkerStatus::Starting, WorkerStatus::Healthy)?;
        self.started_at = Some(SystemTime::now());
        self.last_error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, error: String) -> Result<(), SupervisorError> {
        self.transition(WorkerStatus::Starting, WorkerStatus::Failed)?;
        self.last_error = Some(error);
        Ok(())
    }

    /// Healthy or failed → stopped.
    pub fn mark_stopped(&mut self) -> Result<(), SupervisorError> {
        match self.status {
            WorkerStatus::Healthy | WorkerStatus::Failed => {
                self.status = WorkerStatus::Stopped;
                self.started_at = None;
                self.last_telemetry = None;
                self.telemetry_fetched_at = None;
                Ok(())
            }
            other => Err(self.invalid(other, WorkerStatus::Stopped)),
        }
    }

    /// Synthetic stopped variant for workers whose config disables them.
    pub fn mark_disabled(&mut self) -> Result<(), SupervisorError> {
        if self.status != WorkerStatus::Stopped {
            return Err(self.invalid(self.status, WorkerStatus::Stopped));
        }
        self.disabled = true;
        Ok(())
    }

    pub fn record_telemetry(&mut self, metrics: Value, fetched_at: SystemTime) {
        self.last_telemetry = Some(metrics);
        self.telemetry_fetched_at = Some(fetched_at);
    }

    fn transition(&mut self, from: WorkerStatus, to: WorkerStatus) -> Result<(), SupervisorError> {
        if self.status != from {
            return Err(self.invalid(self.status, to));
        }
        self.status = to;
        Ok(())
    }

    fn invalid(&self, from: WorkerStatus, to: WorkerStatus) -> SupervisorError {
        SupervisorError::InvalidTransition {
            name: self.name.clone(),
            from: from.as_str(),
            to: to.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut state = WorkerRuntimeState::new("profileEngagement");
        state.begin_start().unwrap();
        state.mark_healthy().unwrap();
        assert_eq!(state.status(), WorkerStatus::Healthy);
        assert!(state.started_at().is_some());

        state.mark_stopped().unwrap();
        assert_eq!(state.status(), WorkerStatus::Stopped);
        assert!(state.started_at().is_none());
    }

    #[test]
    fn failure_then_cleanup() {
        let mut state = WorkerRuntimeState::new("newsAggregation");
        state.begin_start().unwrap();
        state.mark_failed("Network unavailable".into()).unwrap();
        assert_eq!(state.last_error(), Some("Network unavailable"));

        state.mark_stopped().unwrap();
        assert_eq!(state.status(), WorkerStatus::Stopped);
        assert_eq!(state.last_error(), Some("Network unavailable"));
    }

    #[test]
    fn cannot_become_healthy_without_starting() {
        let mut state = WorkerRuntimeState::new("profileEngagement");
        let err = state.mark_healthy().unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::InvalidTransition { from: "stopped", to: "healthy", .. }
        ));
    }

    #[test]
    fn disabled_never_visits_starting() {
        let mut state = WorkerRuntimeState::new("profileEngagement");
        state.mark_disabled().unwrap();
        assert!(state.is_disabled());
        assert_eq!(state.status(), WorkerStatus::Stopped);

        state.begin_start().unwrap();
        assert!(!state.is_disabled());
    }
}
