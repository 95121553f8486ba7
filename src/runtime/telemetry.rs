use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// How often [`spawn_metrics_reporter`] logs when no interval is configured.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(30);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the process-wide fmt subscriber once. `RUST_LOG` wins when set;
/// otherwise everything at `info` and above is emitted.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Cumulative counters across every scheduler run of this process.
#[derive(Default, Debug)]
pub struct Telemetry {
    runs: AtomicU64,
    participants_synced: AtomicU64,
    participants_changed: AtomicU64,
    deactivations: AtomicU64,
    grace_holds: AtomicU64,
    errors: AtomicU64,
    workers_processed: AtomicU64,
}

impl Telemetry {
    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synced(&self, changed: bool, workers: u64) {
        self.participants_synced.fetch_add(1, Ordering::Relaxed);
        if changed {
            self.participants_changed.fetch_add(1, Ordering::Relaxed);
        }
        self.record_workers(workers);
    }

    pub fn record_deactivation(&self) {
        self.deactivations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_grace_hold(&self) {
        self.grace_holds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_workers(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.workers_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            participants_synced: self.participants_synced.load(Ordering::Relaxed),
            participants_changed: self.participants_changed.load(Ordering::Relaxed),
            deactivations: self.deactivations.load(Ordering::Relaxed),
            grace_holds: self.grace_holds.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            workers_processed: self.workers_processed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub runs: u64,
    pub participants_synced: u64,
    pub participants_changed: u64,
    pub deactivations: u64,
    pub grace_holds: u64,
    pub errors: u64,
    pub workers_processed: u64,
}

/// Spawns a background task that periodically logs sync throughput and
/// cumulative counters. `fetch_retries` is sampled on every tick.
pub fn spawn_metrics_reporter<R>(
    telemetry: Arc<Telemetry>,
    fetch_retries: R,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()>
where
    R: Fn() -> u64 + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "poolstats::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current_snapshot = telemetry.snapshot();
                    let synced_delta = current_snapshot
                        .participants_synced
                        .saturating_sub(last_snapshot.participants_synced);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        synced_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "poolstats::metrics",
                        throughput = format!("{throughput:.2}"),
                        runs = current_snapshot.runs,
                        synced = current_snapshot.participants_synced,
                        changed = current_snapshot.participants_changed,
                        deactivated = current_snapshot.deactivations,
                        grace_holds = current_snapshot.grace_holds,
                        errors = current_snapshot.errors,
                        workers = current_snapshot.workers_processed,
                        fetch_retries = fetch_retries(),
                        "runtime metrics snapshot"
                    );

                    last_snapshot = current_snapshot;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
