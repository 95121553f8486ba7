//! Retry logging context and canned message templates so remote and local
//! fetches report attempts and exhaustion the same way.

use std::fmt::Display;
use std::time::Duration;

/// Logging labels describing how one fetch path reports retries and
/// exhaustion.
#[derive(Clone, Copy)]
pub(crate) struct RetryMessages {
    pub(crate) retry: &'static str,
    pub(crate) exhausted: &'static str,
    pub(crate) recovered: &'static str,
}

/// Per-call context carrying the participant address.
#[derive(Clone, Copy)]
pub(crate) struct RetryContext<'a> {
    address: &'a str,
    messages: &'a RetryMessages,
}

impl<'a> RetryContext<'a> {
    pub(crate) fn new(address: &'a str, messages: &'a RetryMessages) -> Self {
        Self { address, messages }
    }

    pub(crate) fn log_attempt<E: Display>(
        &self,
        attempt: usize,
        backoff: Duration,
        err: &E,
        will_retry: bool,
    ) {
        if will_retry {
            tracing::warn!(
                address = self.address,
                attempt,
                backoff_ms = duration_to_millis(backoff),
                error = %err,
                "{}",
                self.messages.retry
            );
        } else {
            tracing::error!(
                address = self.address,
                attempt,
                error = %err,
                "{}",
                self.messages.exhausted
            );
        }
    }

    pub(crate) fn log_recovered(&self, attempt: usize) {
        if attempt > 1 {
            tracing::info!(address = self.address, attempt, "{}", self.messages.recovered);
        } else {
            tracing::trace!(address = self.address, "{}", self.messages.recovered);
        }
    }
}

fn duration_to_millis(backoff: Duration) -> u64 {
    backoff.as_millis().min(u128::from(u64::MAX)) as u64
}

pub(crate) const REMOTE_FETCH_RETRY: RetryMessages = RetryMessages {
    retry: "snapshot fetch failed; retrying",
    exhausted: "snapshot fetch exhausted retries",
    recovered: "snapshot fetched",
};

pub(crate) const LOCAL_READ_RETRY: RetryMessages = RetryMessages {
    retry: "local snapshot unreadable; retrying",
    exhausted: "local snapshot read exhausted retries",
    recovered: "local snapshot read",
};
