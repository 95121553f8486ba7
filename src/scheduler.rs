//! Batch Scheduler: drives every active participant through
//! fetch → normalize → lifecycle → reconcile → invalidate, one bounded
//! batch at a time.

mod summary;

pub use summary::{ParticipantOutcome, RunSummary};

use crate::cache::CacheInvalidator;
use crate::error::SyncError;
use crate::lifecycle::{Lifecycle, LifecycleDecision};
use crate::normalize::normalize_snapshot;
use crate::reconcile::{ReconcileMode, Reconciler};
use crate::runtime::clock::{Clock, SystemClock};
use crate::runtime::config::DEFAULT_BATCH_SIZE;
use crate::runtime::telemetry::Telemetry;
use crate::source::SnapshotSource;
use crate::store::{participants, SqliteStore};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;

struct Pipeline {
    source: Arc<dyn SnapshotSource>,
    reconciler: Reconciler,
    lifecycle: Lifecycle,
    invalidator: CacheInvalidator,
    clock: Arc<dyn Clock>,
    telemetry: Arc<Telemetry>,
}

/// Runs the sync pipeline over all active participants.
///
/// Participants inside a batch run concurrently; the next batch starts only
/// after every task of the previous one has settled. A failure or panic in
/// one participant never affects its siblings.
pub struct BatchScheduler {
    store: SqliteStore,
    pipeline: Arc<Pipeline>,
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(store: SqliteStore, source: Arc<dyn SnapshotSource>) -> Self {
        let invalidator = CacheInvalidator::default();
        Self {
            pipeline: Arc::new(Pipeline {
                source,
                reconciler: Reconciler::new(store.clone(), ReconcileMode::Write),
                lifecycle: Lifecycle::new(store.clone(), invalidator.clone()),
                invalidator,
                clock: Arc::new(SystemClock),
                telemetry: Arc::new(Telemetry::default()),
            }),
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_invalidator(mut self, invalidator: CacheInvalidator) -> Self {
        let store = self.store.clone();
        self.update_pipeline(|pipeline| {
            pipeline.lifecycle = Lifecycle::new(store, invalidator.clone());
            pipeline.invalidator = invalidator;
        });
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.update_pipeline(|pipeline| pipeline.clock = clock);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.update_pipeline(|pipeline| pipeline.telemetry = telemetry);
        self
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.pipeline.lifecycle
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.pipeline.telemetry.clone()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Manually restarts a participant's grace window at the scheduler's
    /// current time.
    pub async fn reactivate(&self, address: &str) -> Result<(), SyncError> {
        crate::source::validate_address(address)?;
        let now = self.pipeline.clock.now();
        self.pipeline.lifecycle.reactivate(address, now).await
    }

    fn update_pipeline(&mut self, update: impl FnOnce(&mut Pipeline)) {
        let pipeline = Arc::get_mut(&mut self.pipeline);
        match pipeline {
            Some(pipeline) => update(pipeline),
            None => tracing::warn!("scheduler pipeline is shared; configuration change ignored"),
        }
    }

    /// Repairs lifecycle stamps, then processes every active participant in
    /// batches. Fails only when the store cannot be repaired or enumerated.
    pub async fn run_once(&self) -> Result<RunSummary, SyncError> {
        let started = Instant::now();
        self.pipeline.telemetry.record_run();

        let mut summary = RunSummary {
            repaired: self.pipeline.lifecycle.repair().await?,
            ..RunSummary::default()
        };

        let addresses = self
            .store
            .read(|tx| participants::list_active_addresses(tx))
            .await?;
        tracing::debug!(
            participants = addresses.len(),
            batch_size = self.batch_size,
            "starting sync run"
        );

        for (index, batch) in addresses.chunks(self.batch_size).enumerate() {
            self.run_batch(index, batch, &mut summary).await;
            summary.batches += 1;
        }

        summary.elapsed = started.elapsed();
        summary.log();
        Ok(summary)
    }

    async fn run_batch(&self, index: usize, batch: &[String], summary: &mut RunSummary) {
        let mut tasks = JoinSet::new();
        for address in batch {
            let pipeline = self.pipeline.clone();
            let address = address.clone();
            tasks.spawn(async move {
                let result = AssertUnwindSafe(pipeline.sync_participant(&address))
                    .catch_unwind()
                    .await;
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(panic_payload) => {
                        let panic_msg = panic_message(panic_payload.as_ref());
                        tracing::error!(address = %address, panic = %panic_msg, "participant task panicked");
                        ParticipantOutcome::Failed { kind: "panic" }
                    }
                };
                pipeline.record(&outcome);
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(err) => {
                    tracing::error!(batch = index, error = %err, "participant task failed to join");
                    self.pipeline.telemetry.record_error();
                    summary.record(&ParticipantOutcome::Failed { kind: "join" });
                }
            }
        }
        tracing::debug!(batch = index, size = batch.len(), "batch settled");
    }
}

impl Pipeline {
    async fn sync_participant(&self, address: &str) -> ParticipantOutcome {
        match self.try_sync(address).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(address, kind = err.kind(), error = %err, "participant sync failed");
                ParticipantOutcome::Failed { kind: err.kind() }
            }
        }
    }

    async fn try_sync(&self, address: &str) -> Result<ParticipantOutcome, SyncError> {
        let now = self.clock.now();

        let raw = match self.source.fetch(address).await {
            Ok(raw) => raw,
            Err(SyncError::FileNotFound { path, .. }) => {
                tracing::info!(address, path = %path.display(), "snapshot source missing");
                return Ok(match self.lifecycle.handle_missing_source(address, now).await? {
                    LifecycleDecision::Grace { days_remaining } => {
                        ParticipantOutcome::GraceHold { days_remaining }
                    }
                    LifecycleDecision::MarkInactive => ParticipantOutcome::Deactivated,
                    LifecycleDecision::Fresh => ParticipantOutcome::GraceHold { days_remaining: 0 },
                });
            }
            Err(err) => return Err(err),
        };

        let snapshot = normalize_snapshot(&raw, address);
        let grace_days_remaining = match self
            .lifecycle
            .apply(address, &snapshot.last_share_epoch, now)
            .await?
        {
            LifecycleDecision::MarkInactive => return Ok(ParticipantOutcome::Deactivated),
            LifecycleDecision::Grace { days_remaining } => Some(days_remaining),
            LifecycleDecision::Fresh => None,
        };

        let outcome = self.reconciler.reconcile(address, snapshot, now).await?;
        self.invalidator
            .participant_synced(address, outcome.touched_workers());

        Ok(ParticipantOutcome::Synced {
            changed: outcome.changed,
            workers: outcome.workers_seen,
            grace_days_remaining,
        })
    }

    fn record(&self, outcome: &ParticipantOutcome) {
        match outcome {
            ParticipantOutcome::Synced {
                changed,
                workers,
                grace_days_remaining,
            } => {
                self.telemetry.record_synced(*changed, *workers as u64);
                if grace_days_remaining.is_some() {
                    self.telemetry.record_grace_hold();
                }
            }
            ParticipantOutcome::Deactivated => self.telemetry.record_deactivation(),
            ParticipantOutcome::GraceHold { .. } => self.telemetry.record_grace_hold(),
            ParticipantOutcome::Failed { .. } => self.telemetry.record_error(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
