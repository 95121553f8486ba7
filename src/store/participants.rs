//! Participant repository. Every function takes a plain `&Connection` so it
//! composes inside a caller-owned transaction.

use super::models::{bool_at, millis_at, optional_millis_at, to_millis, NewParticipant, Participant};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str =
    "id, address, authorised, is_active, last_activated_at, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        address: row.get(1)?,
        authorised: row.get(2)?,
        is_active: bool_at(row, 3)?,
        last_activated_at: optional_millis_at(row, 4)?,
        created_at: millis_at(row, 5)?,
        updated_at: millis_at(row, 6)?,
    })
}

pub fn find_by_address(conn: &Connection, address: &str) -> Result<Option<Participant>, StoreError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM participants WHERE address = ?1");
    Ok(conn
        .query_row(&sql, params![address], map_row)
        .optional()?)
}

pub fn insert(conn: &Connection, participant: &NewParticipant) -> Result<Participant, StoreError> {
    conn.execute(
        "INSERT INTO participants \
         (address, authorised, is_active, last_activated_at, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            participant.address,
            participant.authorised,
            participant.is_active,
            participant.last_activated_at.map(to_millis),
            to_millis(participant.created_at),
        ],
    )?;

    Ok(Participant {
        id: conn.last_insert_rowid(),
        address: participant.address.clone(),
        authorised: participant.authorised.clone(),
        is_active: participant.is_active,
        last_activated_at: participant.last_activated_at,
        created_at: participant.created_at,
        updated_at: participant.created_at,
    })
}

/// Stores a new `authorised` value and marks the participant active.
pub fn update_authorisation(
    conn: &Connection,
    id: i64,
    authorised: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE participants SET authorised = ?1, is_active = 1, updated_at = ?2 WHERE id = ?3",
        params![authorised, to_millis(now), id],
    )?;
    Ok(())
}

/// Flips the active bit. Returns false when no such participant exists.
pub fn set_active(
    conn: &Connection,
    address: &str,
    is_active: bool,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE participants SET is_active = ?1, updated_at = ?2 WHERE address = ?3",
        params![is_active, to_millis(now), address],
    )?;
    Ok(updated > 0)
}

/// Restarts the grace window: `last_activated_at = now`, active again.
pub fn reactivate(conn: &Connection, address: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
    let now = to_millis(now);
    let updated = conn.execute(
        "UPDATE participants SET is_active = 1, last_activated_at = ?1, updated_at = ?1 \
         WHERE address = ?2",
        params![now, address],
    )?;
    Ok(updated > 0)
}

/// Backfills `last_activated_at` from `created_at` wherever it is null.
pub fn backfill_last_activated_at(conn: &Connection) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE participants SET last_activated_at = created_at WHERE last_activated_at IS NULL",
        [],
    )?)
}

pub fn list_active_addresses(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT address FROM participants WHERE is_active = 1 ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
