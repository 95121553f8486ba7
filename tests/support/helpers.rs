use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use poolstats_sync::store::{participants, stats, workers, NewParticipant, Participant, WorkerRecord};
use poolstats_sync::{FixedClock, Runner, SqliteStore, SyncConfig, SyncConfigBuilder};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).expect("valid timestamp")
}

/// Config with fast retries so failure paths finish quickly.
pub fn fast_config(source: &str, database: &Path) -> SyncConfigBuilder {
    SyncConfig::builder()
        .source_url(source)
        .database_path(database)
        .fetch_retry_delay(Duration::from_millis(1))
        .request_timeout(Duration::from_secs(2))
        .local_max_attempts(2)
        .local_initial_backoff(Duration::from_millis(1))
        .local_max_backoff(Duration::from_millis(2))
}

pub fn runner(config: SyncConfig) -> Result<(Runner, Arc<FixedClock>)> {
    let clock = Arc::new(FixedClock::new(fixed_now()));
    let runner = Runner::new(config)?.with_clock(clock.clone());
    Ok((runner, clock))
}

/// Upstream-shaped snapshot whose last share is `share_age` old.
pub fn snapshot_json(address: &str, share_age: chrono::Duration, worker_names: &[&str]) -> Value {
    let lastshare = (fixed_now() - share_age).timestamp();
    let workers: Vec<Value> = worker_names
        .iter()
        .map(|name| {
            json!({
                "workername": format!("{address}.{name}"),
                "useragent": "cgminer/4.12.0",
                "lastshare": lastshare,
                "shares": 1200,
                "bestshare": "845.5",
                "bestever": "12000",
                "hashrate1m": "1.2T",
                "hashrate5m": "1.1T",
                "hashrate1hr": "1T",
                "hashrate1d": "950G",
                "hashrate7d": "900G",
                "started": lastshare - 3_600,
            })
        })
        .collect();

    json!({
        "authorised": 1_700_000_000_i64,
        "lastshare": lastshare,
        "workers": worker_names.len(),
        "shares": "2400",
        "bestshare": "845.5",
        "bestever": "12000",
        "hashrate1m": "2.4T",
        "hashrate5m": "2.2T",
        "hashrate1hr": "2T",
        "hashrate1d": "1.9T",
        "hashrate7d": "1.8T",
        "worker": workers,
    })
}

pub async fn seed_participant(
    store: &SqliteStore,
    address: &str,
    activated_ago: Option<chrono::Duration>,
) -> Result<Participant> {
    let participant = NewParticipant {
        address: address.to_owned(),
        authorised: "0".into(),
        is_active: true,
        last_activated_at: activated_ago.map(|ago| fixed_now() - ago),
        created_at: fixed_now() - chrono::Duration::days(2),
    };
    Ok(store
        .transaction(move |tx| participants::insert(tx, &participant))
        .await?)
}

pub async fn participant(store: &SqliteStore, address: &str) -> Result<Option<Participant>> {
    let address = address.to_owned();
    Ok(store
        .read(move |tx| participants::find_by_address(tx, &address))
        .await?)
}

pub async fn workers_of(store: &SqliteStore, address: &str) -> Result<Vec<WorkerRecord>> {
    let address = address.to_owned();
    Ok(store
        .read(move |tx| workers::list_for_address(tx, &address))
        .await?)
}

/// `(participant points, worker points)` recorded for `address`.
pub async fn point_counts(store: &SqliteStore, address: &str) -> Result<(i64, i64)> {
    let address = address.to_owned();
    Ok(store
        .read(move |tx| {
            Ok((
                stats::count_participant_points(tx, &address)?,
                stats::count_worker_points(tx, &address)?,
            ))
        })
        .await?)
}
