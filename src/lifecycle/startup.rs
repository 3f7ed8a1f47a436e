//! Startup orchestration.
//!
//! # Responsibilities
//! - Name the ordered startup stages
//! - Record which stages completed so a failure can be unwound exactly
//!
//! # Design Decisions
//! - Fail fast: any startup error aborts the sequence
//! - Stages run in order, never concurrently
//! - Listener opens last (traffic only when ready)
//! - Unwinding visits completed stages in reverse

use std::fmt;
use std::time::{Duration, Instant};

/// Startup stages in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStage {
    DatabaseWarmed,
    DatabaseBootstrapped,
    WorkersStarted,
    SocketAttached,
    Listening,
}

impl StartupStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartupStage::DatabaseWarmed => "database.warm",
            StartupStage::DatabaseBootstrapped => "database.bootstrap",
            StartupStage::WorkersStarted => "workers",
            StartupStage::SocketAttached => "socket",
            StartupStage::Listening => "listen",
        }
    }
}

impl fmt::Display for StartupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed stages of one startup attempt.
#[derive(Debug)]
pub struct StartupLedger {
    completed: Vec<StartupStage>,
    started: Instant,
}

impl StartupLedger {
    pub fn new() -> Self {
        Self {
            completed: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, stage: StartupStage) {
        tracing::debug!(stage = %stage, "Startup stage complete");
        self.completed.push(stage);
    }

    pub fn completed(&self) -> &[StartupStage] {
        &self.completed
    }

    pub fn has(&self, stage: StartupStage) -> bool {
        self.completed.contains(&stage)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Completed stages, most recent first.
    pub fn unwind(self) -> impl Iterator<Item = StartupStage> {
        self.completed.into_iter().rev()
    }
}

impl Default for StartupLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwind_reverses_completion_order() {
        let mut ledger = StartupLedger::new();
        ledger.record(StartupStage::DatabaseWarmed);
        ledger.record(StartupStage::DatabaseBootstrapped);
        ledger.record(StartupStage::WorkersStarted);

        assert!(ledger.has(StartupStage::WorkersStarted));
        assert!(!ledger.has(StartupStage::Listening));
        assert_eq!(
            ledger.unwind().collect::<Vec<_>>(),
            vec![
                StartupStage::WorkersStarted,
                StartupStage::DatabaseBootstrapped,
                StartupStage::DatabaseWarmed,
            ]
        );
    }
}
