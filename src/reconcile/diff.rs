//! Field-by-field comparison of a persisted worker against an incoming one.
//!
//! Equality is exact: strings byte-for-byte, floats numerically, and
//! `last_update` at whole-second resolution.

use crate::normalize::{HashrateSet, NormalizedWorker};
use crate::store::{WorkerColumn, WorkerRecord};
use rusqlite::types::Value;

/// The mutable columns of one worker row as last seen in this transaction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorkerState {
    pub id: Option<i64>,
    pub user_agent_token: String,
    pub user_agent_raw: String,
    pub hashrate: HashrateSet,
    pub shares: f64,
    pub best_share: f64,
    pub best_ever: f64,
    pub last_update_secs: i64,
}

impl From<WorkerRecord> for WorkerState {
    fn from(record: WorkerRecord) -> Self {
        Self {
            id: Some(record.id),
            user_agent_token: record.user_agent_token,
            user_agent_raw: record.user_agent_raw,
            hashrate: record.hashrate,
            shares: record.shares,
            best_share: record.best_share,
            best_ever: record.best_ever,
            last_update_secs: record.last_update.timestamp(),
        }
    }
}

impl WorkerState {
    pub(crate) fn from_incoming(id: Option<i64>, worker: &NormalizedWorker) -> Self {
        Self {
            id,
            user_agent_token: worker.user_agent_token.clone(),
            user_agent_raw: worker.user_agent_raw.clone(),
            hashrate: worker.hashrate,
            shares: worker.shares,
            best_share: worker.best_share,
            best_ever: worker.best_ever,
            last_update_secs: worker.last_update.timestamp(),
        }
    }
}

/// Columns whose persisted value differs from `incoming`, paired with the
/// value to write.
pub(crate) fn worker_changes(
    existing: &WorkerState,
    incoming: &NormalizedWorker,
) -> Vec<(WorkerColumn, Value)> {
    let mut changes = Vec::new();

    if existing.user_agent_token != incoming.user_agent_token {
        changes.push((
            WorkerColumn::UserAgentToken,
            Value::Text(incoming.user_agent_token.clone()),
        ));
    }
    if existing.user_agent_raw != incoming.user_agent_raw {
        changes.push((
            WorkerColumn::UserAgentRaw,
            Value::Text(incoming.user_agent_raw.clone()),
        ));
    }

    let numeric = [
        (WorkerColumn::Hashrate1m, existing.hashrate.h1m, incoming.hashrate.h1m),
        (WorkerColumn::Hashrate5m, existing.hashrate.h5m, incoming.hashrate.h5m),
        (WorkerColumn::Hashrate1hr, existing.hashrate.h1hr, incoming.hashrate.h1hr),
        (WorkerColumn::Hashrate1d, existing.hashrate.h1d, incoming.hashrate.h1d),
        (WorkerColumn::Hashrate7d, existing.hashrate.h7d, incoming.hashrate.h7d),
        (WorkerColumn::Shares, existing.shares, incoming.shares),
        (WorkerColumn::BestShare, existing.best_share, incoming.best_share),
        (WorkerColumn::BestEver, existing.best_ever, incoming.best_ever),
    ];
    for (column, old, new) in numeric {
        if old != new {
            changes.push((column, Value::Real(new)));
        }
    }

    let last_update = incoming.last_update.timestamp();
    if existing.last_update_secs != last_update {
        changes.push((WorkerColumn::LastUpdate, Value::Integer(last_update)));
    }

    changes
}
