//! Configurable knobs for the snapshot fetcher along with validation so
//! callers can reason about timeouts and retry/backoff limits.

use super::backoff::BackoffSchedule;
use anyhow::{bail, Result};
use std::time::Duration;

pub const DEFAULT_FETCH_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_FETCH_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOCAL_MAX_ATTEMPTS: usize = 5;
pub const DEFAULT_LOCAL_INITIAL_BACKOFF_MS: u64 = 100;
pub const DEFAULT_LOCAL_MAX_BACKOFF_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub request_timeout: Duration,
    pub max_attempts: usize,
    pub retry_delay: Duration,
    pub local_max_attempts: usize,
    pub local_initial_backoff: Duration,
    pub local_max_backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_attempts: DEFAULT_FETCH_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_FETCH_RETRY_DELAY_MS),
            local_max_attempts: DEFAULT_LOCAL_MAX_ATTEMPTS,
            local_initial_backoff: Duration::from_millis(DEFAULT_LOCAL_INITIAL_BACKOFF_MS),
            local_max_backoff: Duration::from_millis(DEFAULT_LOCAL_MAX_BACKOFF_MS),
        }
    }
}

impl FetchOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be greater than 0");
        }
        if self.retry_delay.is_zero() {
            bail!("retry_delay must be greater than 0");
        }
        if self.local_max_attempts == 0 {
            bail!("local_max_attempts must be greater than 0");
        }
        if self.local_initial_backoff.is_zero() {
            bail!("local_initial_backoff must be greater than 0");
        }
        if self.local_max_backoff < self.local_initial_backoff {
            bail!("local_max_backoff must be at least local_initial_backoff");
        }
        Ok(())
    }

    pub(crate) fn remote_schedule(&self) -> BackoffSchedule {
        BackoffSchedule::Linear {
            delay: self.retry_delay,
        }
    }

    pub(crate) fn local_schedule(&self) -> BackoffSchedule {
        BackoffSchedule::Exponential {
            initial: self.local_initial_backoff,
            max: self.local_max_backoff,
        }
    }
}
