//! Closed error taxonomy shared by the fetch → normalize → reconcile pipeline.
//!
//! Every per-participant failure is one of four variants. The scheduler
//! matches on them exhaustively to decide between the grace-period path and
//! "log and retry next run".

use std::path::PathBuf;

/// Failure surfaced by the relational store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store connection lock poisoned")]
    Poisoned,
    #[error("blocking store task failed: {0}")]
    Join(String),
    #[error("invalid persisted value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
}

/// Per-participant pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Bad address or a local path that escapes the configured root.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Network or non-success HTTP failure that survived every retry.
    #[error("fetch for {address} failed after {attempts} attempt(s): {message}")]
    TransientFetch {
        address: String,
        attempts: usize,
        message: String,
    },

    /// The local fallback source has no file for this participant.
    #[error("snapshot file for {address} not found at {}", path.display())]
    FileNotFound { address: String, path: PathBuf },

    /// The per-participant store transaction failed and was rolled back.
    #[error("store transaction failed: {0}")]
    Transaction(#[from] StoreError),
}

impl SyncError {
    /// Short label used in structured logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "validation",
            SyncError::TransientFetch { .. } => "transient_fetch",
            SyncError::FileNotFound { .. } => "file_not_found",
            SyncError::Transaction(_) => "transaction",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }
}
