//! Table definitions and versioned bootstrap.

use crate::error::StoreError;
use rusqlite::Connection;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS participants (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    address           TEXT    NOT NULL UNIQUE,
    authorised        TEXT    NOT NULL DEFAULT '0',
    is_active         INTEGER NOT NULL DEFAULT 1,
    last_activated_at INTEGER,
    created_at        INTEGER NOT NULL,
    updated_at        INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_participants_active ON participants (is_active);

CREATE TABLE IF NOT EXISTS participant_stats (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_id   INTEGER NOT NULL REFERENCES participants (id) ON DELETE CASCADE,
    address          TEXT    NOT NULL,
    hashrate_1m      REAL    NOT NULL,
    hashrate_5m      REAL    NOT NULL,
    hashrate_1hr     REAL    NOT NULL,
    hashrate_1d      REAL    NOT NULL,
    hashrate_7d      REAL    NOT NULL,
    hashrate_7d_exact TEXT   NOT NULL,
    last_share_epoch TEXT    NOT NULL,
    worker_count     INTEGER NOT NULL,
    shares           REAL    NOT NULL,
    best_share       REAL    NOT NULL,
    best_ever        REAL    NOT NULL,
    timestamp        INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_participant_stats_address
    ON participant_stats (address, timestamp);

CREATE TABLE IF NOT EXISTS workers (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_id   INTEGER NOT NULL REFERENCES participants (id) ON DELETE CASCADE,
    address          TEXT    NOT NULL,
    name             TEXT    NOT NULL,
    hashrate_1m      REAL    NOT NULL,
    hashrate_5m      REAL    NOT NULL,
    hashrate_1hr     REAL    NOT NULL,
    hashrate_1d      REAL    NOT NULL,
    hashrate_7d      REAL    NOT NULL,
    shares           REAL    NOT NULL,
    best_share       REAL    NOT NULL,
    best_ever        REAL    NOT NULL,
    last_update      INTEGER NOT NULL,
    user_agent_token TEXT    NOT NULL,
    user_agent_raw   TEXT    NOT NULL,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL,
    UNIQUE (address, name)
);

CREATE TABLE IF NOT EXISTS worker_stats (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    worker_id    INTEGER NOT NULL REFERENCES workers (id) ON DELETE CASCADE,
    address      TEXT    NOT NULL,
    name         TEXT    NOT NULL,
    hashrate_1m  REAL    NOT NULL,
    hashrate_5m  REAL    NOT NULL,
    hashrate_1hr REAL    NOT NULL,
    hashrate_1d  REAL    NOT NULL,
    hashrate_7d  REAL    NOT NULL,
    shares       REAL    NOT NULL,
    best_share   REAL    NOT NULL,
    best_ever    REAL    NOT NULL,
    started      TEXT    NOT NULL,
    timestamp    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_worker_stats_worker ON worker_stats (worker_id, timestamp);
";

/// Creates missing tables and stamps the schema version.
pub fn bootstrap(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::InvalidValue {
            column: "user_version",
            value: current.to_string(),
        });
    }

    if current < CURRENT_SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "store schema bootstrapped");
    }

    Ok(())
}
