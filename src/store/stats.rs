//! Append-only time-series points. Nothing here updates or deletes.

use super::models::{hashrate_at, millis_at, to_millis, ParticipantStatsPoint, WorkerStatsPoint};
use crate::error::StoreError;
use crate::normalize::{NormalizedSnapshot, NormalizedWorker};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub fn append_participant_point(
    conn: &Connection,
    participant_id: i64,
    address: &str,
    snapshot: &NormalizedSnapshot,
    now: DateTime<Utc>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO participant_stats (participant_id, address, \
         hashrate_1m, hashrate_5m, hashrate_1hr, hashrate_1d, hashrate_7d, hashrate_7d_exact, \
         last_share_epoch, worker_count, shares, best_share, best_ever, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            participant_id,
            address,
            snapshot.hashrate.h1m,
            snapshot.hashrate.h5m,
            snapshot.hashrate.h1hr,
            snapshot.hashrate.h1d,
            snapshot.hashrate.h7d,
            snapshot.hashrate_7d_exact,
            snapshot.last_share_epoch,
            snapshot.worker_count,
            snapshot.shares,
            snapshot.best_share,
            snapshot.best_ever,
            to_millis(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn append_worker_point(
    conn: &Connection,
    worker_id: i64,
    address: &str,
    worker: &NormalizedWorker,
    now: DateTime<Utc>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO worker_stats (worker_id, address, name, \
         hashrate_1m, hashrate_5m, hashrate_1hr, hashrate_1d, hashrate_7d, \
         shares, best_share, best_ever, started, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            worker_id,
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
            worker.started,
            to_millis(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_participant_points(conn: &Connection, address: &str) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM participant_stats WHERE address = ?1",
        params![address],
        |row| row.get(0),
    )?)
}

pub fn count_worker_points(conn: &Connection, address: &str) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM worker_stats WHERE address = ?1",
        params![address],
        |row| row.get(0),
    )?)
}

pub fn latest_participant_point(
    conn: &Connection,
    address: &str,
) -> Result<Option<ParticipantStatsPoint>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, participant_id, address, \
             hashrate_1m, hashrate_5m, hashrate_1hr, hashrate_1d, hashrate_7d, hashrate_7d_exact, \
             last_share_epoch, worker_count, shares, best_share, best_ever, timestamp \
             FROM participant_stats WHERE address = ?1 ORDER BY id DESC LIMIT 1",
            params![address],
            |row| {
                Ok(ParticipantStatsPoint {
                    id: row.get(0)?,
                    participant_id: row.get(1)?,
                    address: row.get(2)?,
                    hashrate: hashrate_at(row, 3)?,
                    hashrate_7d_exact: row.get(8)?,
                    last_share_epoch: row.get(9)?,
                    worker_count: row.get(10)?,
                    shares: row.get(11)?,
                    best_share: row.get(12)?,
                    best_ever: row.get(13)?,
                    timestamp: millis_at(row, 14)?,
                })
            },
        )
        .optional()?)
}

pub fn worker_points(
    conn: &Connection,
    worker_id: i64,
) -> Result<Vec<WorkerStatsPoint>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, worker_id, address, name, \
         hashrate_1m, hashrate_5m, hashrate_1hr, hashrate_1d, hashrate_7d, \
         shares, best_share, best_ever, started, timestamp \
         FROM worker_stats WHERE worker_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![worker_id], |row| {
        Ok(WorkerStatsPoint {
            id: row.get(0)?,
            worker_id: row.get(1)?,
            address: row.get(2)?,
            name: row.get(3)?,
            hashrate: hashrate_at(row, 4)?,
            shares: row.get(9)?,
            best_share: row.get(10)?,
            best_ever: row.get(11)?,
            started: row.get(12)?,
            timestamp: millis_at(row, 13)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
