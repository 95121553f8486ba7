use crate::support::{
    helpers::{
        fast_config, init_tracing, participant, point_counts, runner, seed_participant,
        snapshot_json, workers_of,
    },
    mock_upstream::{MockPool, MockPoolServer},
};
use anyhow::Result;
use chrono::Duration;
use hyper::StatusCode;
use poolstats_sync::SqliteStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sync_writes_once_then_only_appends_stats() -> Result<()> {
    init_tracing();
    let pool = MockPool::default();
    pool.set_snapshot("alice", snapshot_json("alice", Duration::minutes(5), &["rig1", "rig2"]));
    let server = MockPoolServer::start(pool.clone()).await?;

    let dir = tempfile::tempdir()?;
    let db = dir.path().join("poolstats.db");
    let store = SqliteStore::open(&db)?;
    seed_participant(&store, "alice", None).await?;

    let (runner, _clock) = runner(fast_config(server.url(), &db).build()?)?;

    let first = runner.run_once().await?;
    assert_eq!(first.synced, 1);
    assert_eq!(first.changed, 1);
    assert_eq!(first.workers, 2);
    assert_eq!(first.repaired, 1);

    let workers = workers_of(&store, "alice").await?;
    let names: Vec<_> = workers.iter().map(|worker| worker.name.as_str()).collect();
    assert_eq!(names, vec!["rig1", "rig2"]);
    assert!((workers[0].hashrate.h1m - 1.2e12).abs() < 1.0);
    assert_eq!(workers[0].user_agent_token, "cgminer");
    assert_eq!(point_counts(&store, "alice").await?, (1, 2));

    let alice = participant(&store, "alice").await?.expect("seeded");
    assert_eq!(alice.authorised, "1700000000");

    let second = runner.run_once().await?;
    assert_eq!(second.synced, 1);
    assert_eq!(second.changed, 0, "identical snapshot must not rewrite rows");
    assert_eq!(point_counts(&store, "alice").await?, (2, 4));

    let unchanged = workers_of(&store, "alice").await?;
    assert_eq!(unchanged[0].updated_at, workers[0].updated_at);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transient_failures_retry_three_times_and_leave_state_untouched() -> Result<()> {
    init_tracing();
    let pool = MockPool::default();
    pool.fail_with("bob", StatusCode::INTERNAL_SERVER_ERROR);
    pool.set_snapshot("carol", snapshot_json("carol", Duration::minutes(1), &["a"]));
    let server = MockPoolServer::start(pool.clone()).await?;

    let dir = tempfile::tempdir()?;
    let db = dir.path().join("poolstats.db");
    let store = SqliteStore::open(&db)?;
    seed_participant(&store, "bob", Some(Duration::days(30))).await?;
    seed_participant(&store, "carol", Some(Duration::days(1))).await?;

    let (runner, _clock) = runner(fast_config(server.url(), &db).build()?)?;
    let summary = runner.run_once().await?;

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.synced, 1, "sibling participant still syncs");
    assert_eq!(pool.hits("bob"), 3);
    assert_eq!(pool.hits("carol"), 1);

    let bob = participant(&store, "bob").await?.expect("seeded");
    assert!(bob.is_active, "fetch failures never deactivate");
    assert_eq!(point_counts(&store, "bob").await?, (0, 0));

    let metrics = runner.fetch_metrics();
    assert_eq!(metrics.total_retries, 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stale_participant_past_grace_is_deactivated_and_can_be_reactivated() -> Result<()> {
    init_tracing();
    let pool = MockPool::default();
    pool.set_snapshot("dave", snapshot_json("dave", Duration::days(10), &["rig"]));
    pool.set_snapshot("erin", snapshot_json("erin", Duration::days(10), &["rig"]));
    let server = MockPoolServer::start(pool.clone()).await?;

    let dir = tempfile::tempdir()?;
    let db = dir.path().join("poolstats.db");
    let store = SqliteStore::open(&db)?;
    seed_participant(&store, "dave", Some(Duration::days(8))).await?;
    seed_participant(&store, "erin", Some(Duration::days(3))).await?;

    let (runner, clock) = runner(fast_config(server.url(), &db).build()?)?;
    let summary = runner.run_once().await?;
    assert_eq!(summary.deactivated, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.grace_holds, 1);

    assert!(!participant(&store, "dave").await?.expect("seeded").is_active);
    assert_eq!(point_counts(&store, "dave").await?, (0, 0));
    assert!(participant(&store, "erin").await?.expect("seeded").is_active);
    assert_eq!(point_counts(&store, "erin").await?, (1, 1));

    runner.reactivate("dave").await?;
    let dave = participant(&store, "dave").await?.expect("seeded");
    assert!(dave.is_active);
    assert_eq!(dave.last_activated_at, Some(clock_now(&clock)));

    let after = runner.run_once().await?;
    assert_eq!(after.deactivated, 0);
    assert_eq!(after.grace_holds, 2);
    assert_eq!(point_counts(&store, "dave").await?, (1, 1));

    server.shutdown().await;
    Ok(())
}

fn clock_now(clock: &poolstats_sync::FixedClock) -> chrono::DateTime<chrono::Utc> {
    use poolstats_sync::Clock;
    clock.now()
}
