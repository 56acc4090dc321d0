//! Shared run status for the /health endpoint.
//! Updated by SyncPipeline after every trigger.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

use crate::sync::PipelineOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NeverRun,
    Succeeded,
    Failed,
}

impl RunStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunStatus::Succeeded,
            2 => RunStatus::Failed,
            _ => RunStatus::NeverRun,
        }
    }
}

/// Pipeline counters. Written by the pipeline, read by the API.
#[derive(Default)]
pub struct HealthState {
    last_status: AtomicU8,
    /// Unix millis of the last finished run (0 = none).
    last_run_at_ms: AtomicI64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
    runs_coalesced: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub last_status: RunStatus,
    pub last_run_at_ms: Option<i64>,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub runs_coalesced: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &PipelineOutcome, at_ms: i64) {
        match outcome {
            PipelineOutcome::Completed(_) => {
                self.last_status.store(1, Ordering::Relaxed);
                self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
            }
            PipelineOutcome::Failed { .. } => {
                self.last_status.store(2, Ordering::Relaxed);
                self.runs_failed.fetch_add(1, Ordering::Relaxed);
            }
            PipelineOutcome::Coalesced => {
                self.runs_coalesced.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.last_run_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let at = self.last_run_at_ms.load(Ordering::Relaxed);
        HealthSnapshot {
            last_status: RunStatus::from_u8(self.last_status.load(Ordering::Relaxed)),
            last_run_at_ms: (at > 0).then_some(at),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_coalesced: self.runs_coalesced.load(Ordering::Relaxed),
        }
    }
}
