use std::time::Duration;

use crate::support::{
    helpers::{fast_config, init_tracing, point_counts, runner, seed_participant, snapshot_json},
    mock_upstream::{MockPool, MockPoolServer},
};
use anyhow::Result;
use poolstats_sync::cache::{participant_key, worker_key, LEADERBOARD_PREFIX};
use poolstats_sync::SqliteStore;
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn committed_sync_invalidates_read_cache() -> Result<()> {
    init_tracing();
    let pool = MockPool::default();
    pool.set_snapshot(
        "alice",
        snapshot_json("alice", chrono::Duration::minutes(1), &["rig"]),
    );
    let server = MockPoolServer::start(pool).await?;

    let dir = tempfile::tempdir()?;
    let db = dir.path().join("poolstats.db");
    let store = SqliteStore::open(&db)?;
    seed_participant(&store, "alice", None).await?;
    let (runner, _clock) = runner(fast_config(server.url(), &db).build()?)?;

    let cache = runner.cache();
    for key in [
        participant_key("alice"),
        worker_key("alice", "rig"),
        format!("{LEADERBOARD_PREFIX}hashrate"),
        participant_key("bob"),
    ] {
        cache
            .get_or_load(&key, || async { Ok::<Value, anyhow::Error>(json!({"cached": true})) })
            .await?;
    }
    assert_eq!(cache.len(), 4);

    runner.run_once().await?;
    assert_eq!(cache.len(), 1, "only the unrelated participant entry survives");

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn periodic_loop_runs_until_cancelled() -> Result<()> {
    init_tracing();
    let pool = MockPool::default();
    pool.set_snapshot(
        "alice",
        snapshot_json("alice", chrono::Duration::minutes(1), &["rig"]),
    );
    let server = MockPoolServer::start(pool.clone()).await?;

    let dir = tempfile::tempdir()?;
    let db = dir.path().join("poolstats.db");
    let store = SqliteStore::open(&db)?;
    seed_participant(&store, "alice", None).await?;

    let config = fast_config(server.url(), &db)
        .sync_interval(Duration::from_millis(25))
        .metrics_interval(Duration::from_millis(25))
        .build()?;
    let (runner, _clock) = runner(config)?;
    let token = runner.cancellation_token();

    let stopper = tokio::spawn(async move {
        sleep(Duration::from_millis(200)).await;
        token.cancel();
    });
    timeout(Duration::from_secs(10), runner.run()).await??;
    stopper.await?;

    let runs = runner.telemetry().snapshot().runs;
    assert!(runs >= 2, "expected repeated runs, saw {runs}");
    let (participant_points, _) = point_counts(&store, "alice").await?;
    assert_eq!(participant_points as u64, runs);
    assert_eq!(pool.hits("alice") as u64, runs);

    server.shutdown().await;
    Ok(())
}
