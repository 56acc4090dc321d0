use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::db::DrawRepository;
use crate::notifier::UpdateNotifier;
use crate::sync::reconciler::Reconciler;
use crate::types::SyncResult;

/// Decides whether a scheduled tick should run the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePolicy {
    min_interval: Duration,
}

impl UpdatePolicy {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    pub fn always() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn needs_update(&self, last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last) = last_sync else {
            return true;
        };
        if self.min_interval.is_zero() {
            return true;
        }
        // A clock that went backwards counts as elapsed.
        match (now - last).to_std() {
            Ok(elapsed) => elapsed >= self.min_interval,
            Err(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Completed(SyncResult),
    Failed { error: String },
    /// Another run was already in flight; this trigger did nothing.
    Coalesced,
}

/// Single-flight wrapper around reconcile → notify.
pub struct SyncPipeline {
    reconciler: Reconciler,
    repo: Arc<dyn DrawRepository>,
    notifier: Arc<UpdateNotifier>,
    health: Arc<HealthState>,
    policy: UpdatePolicy,
    tick: Duration,
    in_flight: Mutex<()>,
}

impl SyncPipeline {
    pub fn new(
        reconciler: Reconciler,
        repo: Arc<dyn DrawRepository>,
        notifier: Arc<UpdateNotifier>,
        health: Arc<HealthState>,
        policy: UpdatePolicy,
        tick: Duration,
    ) -> Self {
        Self { reconciler, repo, notifier, health, policy, tick, in_flight: Mutex::new(()) }
    }

    /// Run the pipeline once. Coalesced if a run is already in progress.
    pub async fn trigger(&self) -> PipelineOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            info!("[PIPELINE] run already in flight, trigger coalesced");
            self.health.record(&PipelineOutcome::Coalesced, Utc::now().timestamp_millis());
            return PipelineOutcome::Coalesced;
        };

        let outcome = match self.reconciler.reconcile().await {
            Ok(result) => PipelineOutcome::Completed(result),
            Err(e) => {
                error!("[PIPELINE] sync failed: {e}");
                PipelineOutcome::Failed { error: e.to_string() }
            }
        };

        self.health.record(&outcome, Utc::now().timestamp_millis());
        let success = matches!(outcome, PipelineOutcome::Completed(_));
        let report = self.notifier.publish(success);
        info!(
            success,
            notified = report.notified,
            observer_failures = report.failed,
            "[PIPELINE] run finished",
        );
        outcome
    }

    /// True if the update policy allows a scheduled run now.
    pub async fn is_due(&self) -> bool {
        match self.repo.load_sync_state().await {
            Ok(state) => self.policy.needs_update(state.last_sync_timestamp, Utc::now()),
            Err(e) => {
                warn!("[PIPELINE] could not read sync state, running anyway: {e}");
                true
            }
        }
    }

    /// Scheduled loop: ticks immediately, then every `tick`, until `shutdown` flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.tick);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[PIPELINE] shutdown requested, stopping scheduler");
                        return;
                    }
                    continue;
                }
            }

            if !self.is_due().await {
                continue;
            }
            self.trigger().await;
        }
    }
}
