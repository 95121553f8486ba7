use super::schema::bootstrap;
use crate::error::StoreError;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store shared by every pipeline task.
///
/// A single connection sits behind a mutex; each participant's work runs in
/// one transaction on the blocking pool, so writes for different
/// participants are serialized but never interleaved.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        bootstrap(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `operation` inside one transaction. The transaction commits only
    /// when `operation` returns `Ok`; any error rolls every write back.
    pub async fn transaction<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            let tx = guard.transaction()?;
            let value = operation(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .map_err(|err| StoreError::Join(err.to_string()))?
    }

    /// Runs `operation` inside a transaction that is always rolled back.
    /// Used for dry runs and reads that must see a consistent view.
    pub async fn read<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            let tx = guard.transaction()?;
            let value = operation(&tx)?;
            tx.rollback()?;
            Ok(value)
        })
        .await
        .map_err(|err| StoreError::Join(err.to_string()))?
    }
}
