//! In-process read cache with per-entry TTL plus random jitter, single-flight
//! loading, prefix invalidation and a background expiry sweep.

use super::ReadCache;
use futures::future::{BoxFuture, FutureExt, Shared};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::select;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
/// Largest fraction of the TTL added as jitter.
pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

#[derive(Debug, Clone, thiserror::Error)]
#[error("cache load failed: {0}")]
pub struct CacheLoadError(Arc<anyhow::Error>);

type LoadFuture<V> = Shared<BoxFuture<'static, Result<V, CacheLoadError>>>;

enum Slot<V> {
    Ready { value: V, expires_at: Instant },
    Loading { id: u64, load: LoadFuture<V> },
}

struct Inner<V> {
    entries: Mutex<HashMap<String, Slot<V>>>,
    ttl: Duration,
    jitter_ratio: f64,
    next_load_id: AtomicU64,
}

/// Cloneable handle to a shared TTL cache.
pub struct TtlCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_JITTER_RATIO)
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, jitter_ratio: f64) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                ttl,
                jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
                next_load_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cached value for `key`, or runs `loader` to produce it.
    ///
    /// Concurrent callers for the same missing key share one load. A load
    /// whose key is invalidated while it runs still answers its callers but
    /// is not stored.
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<V, CacheLoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let load = {
            let mut entries = self.inner.lock();
            match entries.get(key) {
                Some(Slot::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                    return Ok(value.clone());
                }
                Some(Slot::Loading { load, .. }) => load.clone(),
                _ => {
                    let id = self.inner.next_load_id.fetch_add(1, Ordering::Relaxed);
                    // The load settles its own slot so that it completes
                    // whichever caller ends up driving it.
                    let inner = Arc::downgrade(&self.inner);
                    let owned_key = key.to_owned();
                    let load = loader()
                        .map(move |result| {
                            let result = result.map_err(|err| CacheLoadError(Arc::new(err)));
                            if let Some(inner) = inner.upgrade() {
                                inner.finish_load(&owned_key, id, &result);
                            }
                            result
                        })
                        .boxed()
                        .shared();
                    entries.insert(
                        key.to_owned(),
                        Slot::Loading {
                            id,
                            load: load.clone(),
                        },
                    );
                    load
                }
            }
        };

        load.await
    }

    /// Drops expired entries and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.lock();
        let before = entries.len();
        entries.retain(|_, slot| match slot {
            Slot::Ready { expires_at, .. } => *expires_at > now,
            Slot::Loading { load, .. } => load.peek().is_none(),
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns a task that sweeps expired entries every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("cache sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = cache.len(), "swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

impl<V> Inner<V>
where
    V: Clone,
{
    fn finish_load(&self, key: &str, id: u64, result: &Result<V, CacheLoadError>) {
        let mut entries = self.lock();
        let still_ours = matches!(
            entries.get(key),
            Some(Slot::Loading { id: current, .. }) if *current == id
        );
        if !still_ours {
            return;
        }
        match result {
            Ok(value) => {
                entries.insert(
                    key.to_owned(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at: Instant::now() + self.entry_ttl(),
                    },
                );
            }
            Err(_) => {
                entries.remove(key);
            }
        }
    }

    fn entry_ttl(&self) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return self.ttl;
        }
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_ratio);
        self.ttl + self.ttl.mul_f64(jitter)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> ReadCache for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn invalidate(&self, key: &str) {
        self.inner.lock().remove(key);
    }

    fn invalidate_prefix(&self, prefix: &str) {
        self.inner.lock().retain(|key, _| !key.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<u32>> {
        let calls = calls.clone();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_loads_are_single_flight() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(60), 0.0);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_load("user:abc", counting_loader(&calls, 1)),
            cache.get_or_load("user:abc", counting_loader(&calls, 2)),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(5), 0.0);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_load("k", counting_loader(&calls, 1)).await.unwrap();
        cache.get_or_load("k", counting_loader(&calls, 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());

        let value = cache.get_or_load("k", counting_loader(&calls, 2)).await.unwrap();
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_stays_within_bounds() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(10), 0.5);
        for _ in 0..32 {
            let ttl = cache.inner.entry_ttl();
            assert!(ttl >= Duration::from_secs(10));
            assert!(ttl <= Duration::from_secs(15));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_during_load_does_not_repopulate() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(60), 0.0);
        let calls = Arc::new(AtomicUsize::new(0));

        let loader_cache = cache.clone();
        let loading = tokio::spawn({
            let calls = calls.clone();
            async move {
                loader_cache
                    .get_or_load("user:abc", counting_loader(&calls, 1))
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        cache.invalidate("user:abc");
        assert_eq!(loading.await.unwrap().unwrap(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_caller_does_not_pin_the_load() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(5), 0.0);
        let calls = Arc::new(AtomicUsize::new(0));

        let starter = tokio::spawn({
            let cache = cache.clone();
            let loader = counting_loader(&calls, 1);
            async move { cache.get_or_load("user:abc", loader).await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        starter.abort();
        assert!(starter.await.unwrap_err().is_cancelled());

        let joined = cache.get_or_load("user:abc", counting_loader(&calls, 2)).await;
        assert_eq!(joined.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(cache.sweep(), 1);

        let reloaded = cache.get_or_load("user:abc", counting_loader(&calls, 3)).await;
        assert_eq!(reloaded.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_finished_by_another_caller_is_dropped() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(5), 0.0);

        let starter = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_load("k", || async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err::<u32, _>(anyhow::anyhow!("db down"))
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        starter.abort();
        let _ = starter.await;

        let err = cache
            .get_or_load("k", || async { Ok::<u32, anyhow::Error>(7) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("db down"));
        assert!(cache.is_empty());

        let value = cache
            .get_or_load("k", || async { Ok::<u32, anyhow::Error>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_settled_loads_nobody_claimed() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(5), 0.0);
        let settled: LoadFuture<u32> = futures::future::ready(Ok(1)).boxed().shared();
        let _ = settled.clone().await;
        cache.inner.lock().insert(
            "k".to_owned(),
            Slot::Loading {
                id: u64::MAX,
                load: settled,
            },
        );
        let pending: LoadFuture<u32> = futures::future::pending().boxed().shared();
        cache.inner.lock().insert(
            "p".to_owned(),
            Slot::Loading {
                id: u64::MAX - 1,
                load: pending,
            },
        );

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prefix_invalidation_drops_matching_keys() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(60), 0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        for key in ["leaderboard:hashrate", "leaderboard:shares", "user:abc"] {
            cache.get_or_load(key, counting_loader(&calls, 1)).await.unwrap();
        }

        cache.invalidate_prefix("leaderboard:");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_is_not_cached() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(60), 0.0);
        let err = cache
            .get_or_load("k", || async { Err(anyhow::anyhow!("db down")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("db down"));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_cancellation() {
        let cache = TtlCache::<u32>::new(Duration::from_secs(1), 0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_load("k", counting_loader(&calls, 1)).await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_millis(500), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(cache.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
