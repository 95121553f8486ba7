//! Cache Invalidator: the outbound contract to the read-side cache, its key
//! scheme, and an in-process TTL cache implementing that contract.

pub mod invalidator;
pub mod keys;
pub mod ttl;

pub use invalidator::CacheInvalidator;
pub use keys::{history_key, participant_key, worker_key, LEADERBOARD_PREFIX};
pub use ttl::{CacheLoadError, TtlCache, DEFAULT_CACHE_TTL, DEFAULT_JITTER_RATIO};

/// Invalidation surface exposed by a read cache.
pub trait ReadCache: Send + Sync {
    fn invalidate(&self, key: &str);
    fn invalidate_prefix(&self, prefix: &str);
}

/// Cache that holds nothing; used when no read side is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ReadCache for NoopCache {
    fn invalidate(&self, _key: &str) {}

    fn invalidate_prefix(&self, _prefix: &str) {}
}
