//! Row types for the four persisted collections.
//!
//! `Participant` and `WorkerRecord` are the only mutable rows; the two stats
//! point types are append-only.

use crate::normalize::HashrateSet;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: i64,
    pub address: String,
    pub authorised: String,
    pub is_active: bool,
    pub last_activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values used to insert a participant row directly (seeding, imports).
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub address: String,
    pub authorised: String,
    pub is_active: bool,
    pub last_activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRecord {
    pub id: i64,
    pub participant_id: i64,
    pub address: String,
    pub name: String,
    pub hashrate: HashrateSet,
    pub shares: f64,
    pub best_share: f64,
    pub best_ever: f64,
    pub last_update: DateTime<Utc>,
    pub user_agent_token: String,
    pub user_agent_raw: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantStatsPoint {
    pub id: i64,
    pub participant_id: i64,
    pub address: String,
    pub hashrate: HashrateSet,
    pub hashrate_7d_exact: String,
    pub last_share_epoch: String,
    pub worker_count: i64,
    pub shares: f64,
    pub best_share: f64,
    pub best_ever: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStatsPoint {
    pub id: i64,
    pub worker_id: i64,
    pub address: String,
    pub name: String,
    pub hashrate: HashrateSet,
    pub shares: f64,
    pub best_share: f64,
    pub best_ever: f64,
    pub started: String,
    pub timestamp: DateTime<Utc>,
}

pub(crate) fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn millis_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

pub(crate) fn optional_millis_at(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(millis) => DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis)),
        None => Ok(None),
    }
}

pub(crate) fn seconds_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let seconds: i64 = row.get(idx)?;
    DateTime::from_timestamp(seconds, 0)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, seconds))
}

pub(crate) fn bool_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    match row.get::<_, i64>(idx)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("expected 0 or 1, found {other}").into(),
        )),
    }
}

/// Reads five consecutive hashrate columns starting at `first`.
pub(crate) fn hashrate_at(row: &Row<'_>, first: usize) -> rusqlite::Result<HashrateSet> {
    Ok(HashrateSet {
        h1m: row.get(first)?,
        h5m: row.get(first + 1)?,
        h1hr: row.get(first + 2)?,
        h1d: row.get(first + 3)?,
        h7d: row.get(first + 4)?,
    })
}
