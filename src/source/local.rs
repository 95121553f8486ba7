//! Local fallback reads of `{root}/users/{address}`.
//!
//! An external writer may replace a snapshot file at any time, so a missing
//! or half-written file is retried with exponential backoff before the read
//! gives up.

use super::backoff::{retry_with_backoff, RetryBackoff, RetryDisposition};
use super::metrics::FetchMetrics;
use super::options::FetchOptions;
use super::payload::RawSnapshot;
use super::retry::{RetryContext, LOCAL_READ_RETRY};
use crate::error::SyncError;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, thiserror::Error)]
enum LocalReadError {
    #[error("snapshot file is missing")]
    Missing,
    #[error("snapshot file is malformed: {0}")]
    Malformed(serde_json::Error),
    #[error("{} resolves outside the source root", .0.display())]
    Escaped(PathBuf),
    #[error("snapshot file unreadable: {0}")]
    Io(io::Error),
}

/// Path the snapshot for `address` is expected at, before symlink
/// resolution. `address` must already be validated.
pub(crate) fn snapshot_path(root: &Path, address: &str) -> PathBuf {
    root.join("users").join(address)
}

pub(crate) async fn read_snapshot(
    root: &Path,
    address: &str,
    options: &FetchOptions,
    metrics: &FetchMetrics,
) -> Result<RawSnapshot, SyncError> {
    let real_root = fs::canonicalize(root).await.map_err(|err| {
        SyncError::validation(format!(
            "source root {} cannot be resolved: {err}",
            root.display()
        ))
    })?;
    let candidate = snapshot_path(&real_root, address);
    let context = RetryContext::new(address, &LOCAL_READ_RETRY);
    let config = RetryBackoff::new(options.local_schedule(), options.local_max_attempts);

    metrics.record_local_read();
    let result = retry_with_backoff(
        config,
        |attempt| {
            let read = read_once(&real_root, &candidate);
            async move { read.await.map(|snapshot| (snapshot, attempt)) }
        },
        |attempt, backoff, err: &LocalReadError, will_retry| {
            if will_retry {
                metrics.record_retry();
            }
            context.log_attempt(attempt, backoff, err, will_retry);
        },
        |_, err| match err {
            LocalReadError::Missing | LocalReadError::Malformed(_) => RetryDisposition::Retry,
            LocalReadError::Escaped(_) | LocalReadError::Io(_) => RetryDisposition::Abort,
        },
    )
    .await;

    match result {
        Ok((snapshot, attempt)) => {
            context.log_recovered(attempt);
            Ok(snapshot)
        }
        Err(failure) => Err(match failure.error {
            LocalReadError::Missing => SyncError::FileNotFound {
                address: address.to_owned(),
                path: snapshot_path(root, address),
            },
            LocalReadError::Escaped(path) => SyncError::validation(format!(
                "snapshot path {} escapes source root {}",
                path.display(),
                real_root.display()
            )),
            err @ (LocalReadError::Malformed(_) | LocalReadError::Io(_)) => {
                SyncError::TransientFetch {
                    address: address.to_owned(),
                    attempts: failure.attempts,
                    message: err.to_string(),
                }
            }
        }),
    }
}

async fn read_once(real_root: &Path, candidate: &Path) -> Result<RawSnapshot, LocalReadError> {
    let real_path = match fs::canonicalize(candidate).await {
        Ok(path) => path,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(LocalReadError::Missing),
        Err(err) => return Err(LocalReadError::Io(err)),
    };
    if !real_path.starts_with(real_root) {
        return Err(LocalReadError::Escaped(real_path));
    }

    let body = match fs::read(&real_path).await {
        Ok(body) => body,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(LocalReadError::Missing),
        Err(err) => return Err(LocalReadError::Io(err)),
    };
    serde_json::from_slice(&body).map_err(LocalReadError::Malformed)
}
