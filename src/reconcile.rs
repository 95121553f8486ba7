//! Reconciler: persists one normalized snapshot for one participant inside
//! a single store transaction, writing only rows that actually changed
//! while always extending the time series.

mod diff;

use crate::error::{StoreError, SyncError};
use crate::normalize::{NormalizedSnapshot, NormalizedWorker};
use crate::store::models::NewParticipant;
use crate::store::{participants, stats, workers, SqliteStore};
use chrono::{DateTime, Utc};
use diff::{worker_changes, WorkerState};
use rusqlite::Connection;
use std::collections::HashMap;

/// Write strategy for the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// Persist every change and append stats points.
    #[default]
    Write,
    /// Compare only; the transaction is always rolled back.
    DryRun,
}

/// What one reconciliation did (or, in dry-run mode, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Whether any participant or worker row was (or would be) mutated.
    pub changed: bool,
    pub participant_created: bool,
    pub participant_updated: bool,
    pub workers_inserted: Vec<String>,
    pub workers_updated: Vec<String>,
    /// Worker entries in the snapshot, duplicates included.
    pub workers_seen: usize,
    /// Stats points appended: one participant point plus one per worker
    /// entry. Always zero in dry-run mode.
    pub stats_points: usize,
}

impl ReconcileOutcome {
    /// Names of workers whose lookup entries became stale.
    pub fn touched_workers(&self) -> impl Iterator<Item = &str> {
        self.workers_inserted
            .iter()
            .chain(self.workers_updated.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    store: SqliteStore,
    mode: ReconcileMode,
}

impl Reconciler {
    pub fn new(store: SqliteStore, mode: ReconcileMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// Reconciles `snapshot` into the store using the configured mode.
    ///
    /// In write mode every step commits together or not at all.
    pub async fn reconcile(
        &self,
        address: &str,
        snapshot: NormalizedSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, SyncError> {
        let address = address.to_owned();
        let outcome = match self.mode {
            ReconcileMode::Write => {
                self.store
                    .transaction(move |tx| reconcile_in(tx, &address, &snapshot, now, true))
                    .await?
            }
            ReconcileMode::DryRun => {
                self.store
                    .read(move |tx| reconcile_in(tx, &address, &snapshot, now, false))
                    .await?
            }
        };
        Ok(outcome)
    }

    /// Reports whether reconciling `snapshot` would mutate any participant
    /// or worker row, without writing anything.
    pub async fn detect_changes(
        &self,
        address: &str,
        snapshot: NormalizedSnapshot,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let address = address.to_owned();
        let outcome = self
            .store
            .read(move |tx| reconcile_in(tx, &address, &snapshot, now, false))
            .await?;
        Ok(outcome.changed)
    }
}

fn reconcile_in(
    conn: &Connection,
    address: &str,
    snapshot: &NormalizedSnapshot,
    now: DateTime<Utc>,
    persist: bool,
) -> Result<ReconcileOutcome, StoreError> {
    let mut outcome = ReconcileOutcome {
        workers_seen: snapshot.workers.len(),
        ..ReconcileOutcome::default()
    };

    let participant_id = match participants::find_by_address(conn, address)? {
        None => {
            outcome.participant_created = true;
            if persist {
                let created = participants::insert(
                    conn,
                    &NewParticipant {
                        address: address.to_owned(),
                        authorised: snapshot.authorised.clone(),
                        is_active: true,
                        last_activated_at: Some(now),
                        created_at: now,
                    },
                )?;
                Some(created.id)
            } else {
                None
            }
        }
        Some(existing) => {
            if existing.authorised != snapshot.authorised || !existing.is_active {
                outcome.participant_updated = true;
                if persist {
                    participants::update_authorisation(
                        conn,
                        existing.id,
                        &snapshot.authorised,
                        now,
                    )?;
                }
            }
            Some(existing.id)
        }
    };

    if persist {
        if let Some(id) = participant_id {
            stats::append_participant_point(conn, id, address, snapshot, now)?;
            outcome.stats_points += 1;
        }
    }

    let mut seen: HashMap<&str, WorkerState> = HashMap::new();
    for worker in &snapshot.workers {
        let state = reconcile_worker(
            conn,
            participant_id,
            address,
            worker,
            seen.remove(worker.name.as_str()),
            now,
            persist,
            &mut outcome,
        )?;

        if persist {
            if let Some(worker_id) = state.id {
                stats::append_worker_point(conn, worker_id, address, worker, now)?;
                outcome.stats_points += 1;
            }
        }
        seen.insert(worker.name.as_str(), state);
    }

    outcome.changed = outcome.participant_created
        || outcome.participant_updated
        || !outcome.workers_inserted.is_empty()
        || !outcome.workers_updated.is_empty();
    Ok(outcome)
}

/// Inserts or diffs one worker entry. `previous` is the state left by an
/// earlier entry with the same name in this snapshot, if any.
#[allow(clippy::too_many_arguments)]
fn reconcile_worker(
    conn: &Connection,
    participant_id: Option<i64>,
    address: &str,
    worker: &NormalizedWorker,
    previous: Option<WorkerState>,
    now: DateTime<Utc>,
    persist: bool,
    outcome: &mut ReconcileOutcome,
) -> Result<WorkerState, StoreError> {
    let existing = match previous {
        Some(state) => Some(state),
        None if participant_id.is_some() => {
            workers::find(conn, address, &worker.name)?.map(WorkerState::from)
        }
        None => None,
    };

    let Some(existing) = existing else {
        push_unique(&mut outcome.workers_inserted, &worker.name);
        let id = match (persist, participant_id) {
            (true, Some(participant_id)) => {
                Some(workers::insert(conn, participant_id, address, worker, now)?.id)
            }
            _ => None,
        };
        return Ok(WorkerState::from_incoming(id, worker));
    };

    let changes = worker_changes(&existing, worker);
    if changes.is_empty() {
        return Ok(existing);
    }

    if persist {
        if let Some(id) = existing.id {
            workers::update_columns(conn, id, &changes, now)?;
        }
    }
    if !outcome.workers_inserted.contains(&worker.name) {
        push_unique(&mut outcome.workers_updated, &worker.name);
    }
    Ok(WorkerState::from_incoming(existing.id, worker))
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|existing| existing == name) {
        names.push(name.to_owned());
    }
}
