use super::keys::{history_key, participant_key, worker_key, LEADERBOARD_PREFIX};
use super::{NoopCache, ReadCache};
use std::sync::Arc;

/// Translates committed pipeline effects into read-cache invalidations.
///
/// Holds no knowledge of what the cache contains; every call is a plain
/// outbound notification.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn ReadCache>,
}

impl Default for CacheInvalidator {
    fn default() -> Self {
        Self::new(Arc::new(NoopCache))
    }
}

impl std::fmt::Debug for CacheInvalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidator").finish_non_exhaustive()
    }
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn ReadCache>) -> Self {
        Self { cache }
    }

    /// A reconciliation committed for `address`. `workers` names the worker
    /// rows that were inserted or rewritten.
    pub fn participant_synced<'a>(&self, address: &str, workers: impl IntoIterator<Item = &'a str>) {
        self.invalidate_participant(address);
        for name in workers {
            self.cache.invalidate(&worker_key(address, name));
        }
        self.cache.invalidate_prefix(LEADERBOARD_PREFIX);
        tracing::trace!(address, "read cache invalidated after sync");
    }

    /// The participant's active bit changed.
    pub fn participant_transitioned(&self, address: &str) {
        self.invalidate_participant(address);
        self.cache.invalidate_prefix(LEADERBOARD_PREFIX);
        tracing::debug!(address, "read cache invalidated after lifecycle transition");
    }

    fn invalidate_participant(&self, address: &str) {
        self.cache.invalidate(&participant_key(address));
        self.cache.invalidate(&history_key(address));
    }
}
