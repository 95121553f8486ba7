//! Worker repository, keyed by `(address, name)`.

use super::models::{hashrate_at, millis_at, seconds_at, to_millis, WorkerRecord};
use crate::error::StoreError;
use crate::normalize::NormalizedWorker;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = "id, participant_id, address, name, \
     hashrate_1m, hashrate_5m, hashrate_1hr, hashrate_1d, hashrate_7d, \
     shares, best_share, best_ever, last_update, user_agent_token, user_agent_raw, updated_at";

/// Mutable worker columns that the reconciler may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerColumn {
    UserAgentToken,
    UserAgentRaw,
    Hashrate1m,
    Hashrate5m,
    Hashrate1hr,
    Hashrate1d,
    Hashrate7d,
    Shares,
    BestShare,
    BestEver,
    LastUpdate,
}

impl WorkerColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerColumn::UserAgentToken => "user_agent_token",
            WorkerColumn::UserAgentRaw => "user_agent_raw",
            WorkerColumn::Hashrate1m => "hashrate_1m",
            WorkerColumn::Hashrate5m => "hashrate_5m",
            WorkerColumn::Hashrate1hr => "hashrate_1hr",
            WorkerColumn::Hashrate1d => "hashrate_1d",
            WorkerColumn::Hashrate7d => "hashrate_7d",
            WorkerColumn::Shares => "shares",
            WorkerColumn::BestShare => "best_share",
            WorkerColumn::BestEver => "best_ever",
            WorkerColumn::LastUpdate => "last_update",
        }
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<WorkerRecord> {
    Ok(WorkerRecord {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        address: row.get(2)?,
        name: row.get(3)?,
        hashrate: hashrate_at(row, 4)?,
        shares: row.get(9)?,
        best_share: row.get(10)?,
        best_ever: row.get(11)?,
        last_update: seconds_at(row, 12)?,
        user_agent_token: row.get(13)?,
        user_agent_raw: row.get(14)?,
        updated_at: millis_at(row, 15)?,
    })
}

pub fn find(conn: &Connection, address: &str, name: &str) -> Result<Option<WorkerRecord>, StoreError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM workers WHERE address = ?1 AND name = ?2");
    Ok(conn
        .query_row(&sql, params![address, name], map_row)
        .optional()?)
}

pub fn list_for_address(conn: &Connection, address: &str) -> Result<Vec<WorkerRecord>, StoreError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM workers WHERE address = ?1 ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![address], map_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn insert(
    conn: &Connection,
    participant_id: i64,
    address: &str,
    worker: &NormalizedWorker,
    now: DateTime<Utc>,
) -> Result<WorkerRecord, StoreError> {
    let now_ms = to_millis(now);
    conn.execute(
        "INSERT INTO workers (participant_id, address, name, \
         hashrate_1m, hashrate_5m, hashrate_1hr, hashrate_1d, hashrate_7d, \
         shares, best_share, best_ever, last_update, user_agent_token, user_agent_raw, \
         created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        params![
            participant_id,
            address,
            worker.name,
            worker.hashrate.h1m,
            worker.hashrate.h5m,
            worker.hashrate.h1hr,
            worker.hashrate.h1d,
            worker.hashrate.h7d,
            worker.shares,
            worker.best_share,
            worker.best_ever,
            worker.last_update.timestamp(),
            worker.user_agent_token,
            worker.user_agent_raw,
            now_ms,
        ],
    )?;

    Ok(WorkerRecord {
        id: conn.last_insert_rowid(),
        participant_id,
        address: address.to_owned(),
        name: worker.name.clone(),
        hashrate: worker.hashrate,
        shares: worker.shares,
        best_share: worker.best_share,
        best_ever: worker.best_ever,
        last_update: worker.last_update,
        user_agent_token: worker.user_agent_token.clone(),
        user_agent_raw: worker.user_agent_raw.clone(),
        updated_at: now,
    })
}

/// Rewrites only the given columns. An empty assignment list is a no-op.
pub fn update_columns(
    conn: &Connection,
    id: i64,
    assignments: &[(WorkerColumn, Value)],
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    if assignments.is_empty() {
        return Ok(());
    }

    let mut sql = String::from("UPDATE workers SET ");
    for (idx, (column, _)) in assignments.iter().enumerate() {
        sql.push_str(column.as_str());
        sql.push_str(&format!(" = ?{}, ", idx + 1));
    }
    let updated_at_idx = assignments.len() + 1;
    sql.push_str(&format!(
        "updated_at = ?{updated_at_idx} WHERE id = ?{}",
        updated_at_idx + 1
    ));

    let values = assignments
        .iter()
        .map(|(_, value)| value.clone())
        .chain([Value::Integer(to_millis(now)), Value::Integer(id)]);
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}
