use crate::cache::{CacheInvalidator, ReadCache, TtlCache, DEFAULT_CACHE_TTL, DEFAULT_JITTER_RATIO};
use crate::runtime::clock::Clock;
use crate::runtime::config::SyncConfig;
use crate::runtime::telemetry::{spawn_metrics_reporter, Telemetry};
use crate::scheduler::{BatchScheduler, RunSummary};
use crate::source::{FetchMetricsSnapshot, SnapshotFetcher};
use crate::store::SqliteStore;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Owns the store, the fetcher and the scheduler, and drives periodic sync
/// runs until shutdown.
///
/// Runs never overlap: the next one is scheduled only after the previous
/// one has returned. Cancellation is observed between runs, never inside
/// one.
pub struct Runner {
    config: SyncConfig,
    fetcher: Arc<SnapshotFetcher>,
    scheduler: BatchScheduler,
    cache: TtlCache<Value>,
    shutdown: CancellationToken,
}

impl Runner {
    /// Opens the database, resolves the source and wires the read cache into
    /// the invalidator.
    pub fn new(config: SyncConfig) -> Result<Self> {
        config.validate()?;

        let store = SqliteStore::open(config.database_path()).with_context(|| {
            format!(
                "failed to open database at {}",
                config.database_path().display()
            )
        })?;
        let fetcher = Arc::new(SnapshotFetcher::from_config(&config)?);
        let cache = TtlCache::new(DEFAULT_CACHE_TTL, DEFAULT_JITTER_RATIO);
        let read_cache: Arc<dyn ReadCache> = Arc::new(cache.clone());

        let scheduler = BatchScheduler::new(store, fetcher.clone())
            .with_batch_size(config.batch_size())
            .with_invalidator(CacheInvalidator::new(read_cache));

        Ok(Self {
            config,
            fetcher,
            scheduler,
            cache,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.scheduler = self.scheduler.with_clock(clock);
        self
    }

    /// Returns a clone of the root shutdown token so external callers can
    /// integrate with their own signal handlers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Read cache invalidated by every committed sync and transition.
    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.scheduler.telemetry()
    }

    pub fn fetch_metrics(&self) -> FetchMetricsSnapshot {
        self.fetcher.metrics()
    }

    /// Executes a single scheduler run.
    pub async fn run_once(&self) -> Result<RunSummary> {
        self.scheduler
            .run_once()
            .await
            .context("sync run aborted before processing participants")
    }

    /// Restarts a participant's grace window.
    pub async fn reactivate(&self, address: &str) -> Result<()> {
        self.scheduler
            .reactivate(address)
            .await
            .with_context(|| format!("failed to reactivate {address}"))
    }

    /// Backfills missing activation stamps without running a sync.
    pub async fn repair(&self) -> Result<usize> {
        self.scheduler
            .lifecycle()
            .repair()
            .await
            .context("failed to repair activation stamps")
    }

    /// Runs sync passes every `sync_interval` until the shutdown token is
    /// cancelled. A failed pass is logged and retried on the next tick.
    pub async fn run(&self) -> Result<()> {
        let background = self.spawn_background_tasks();
        let interval = self.config.sync_interval();
        tracing::info!(
            source = self.config.source_url(),
            batch_size = self.scheduler.batch_size(),
            interval_secs = interval.as_secs(),
            "sync loop started"
        );

        while !self.shutdown.is_cancelled() {
            if let Err(err) = self.run_once().await {
                tracing::error!(error = %format!("{err:#}"), "sync run failed");
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {}
                _ = sleep(interval) => {}
            }
        }

        tracing::info!("sync loop stopped");
        self.shutdown.cancel();
        for handle in background {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background task ended abnormally");
            }
        }
        Ok(())
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is
    /// cancelled elsewhere. An in-flight run always completes first.
    pub async fn run_until_ctrl_c(&self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let signal_task = tokio::spawn(async move {
            tokio::select! {
                result = signal::ctrl_c() => match result {
                    Ok(()) => {
                        tracing::info!("Ctrl-C received; stopping after the current run");
                        shutdown.cancel();
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to listen for Ctrl-C"),
                },
                _ = shutdown.cancelled() => {}
            }
        });

        let result = self.run().await;
        signal_task.abort();
        result
    }

    fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let fetcher = self.fetcher.clone();
        vec![
            spawn_metrics_reporter(
                self.telemetry(),
                move || fetcher.metrics().total_retries,
                self.shutdown.clone(),
                self.config.metrics_interval(),
            ),
            self.cache
                .spawn_sweeper(DEFAULT_CACHE_TTL, self.shutdown.clone()),
        ]
    }
}
