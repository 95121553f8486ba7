use crate::support::helpers::{
    fast_config, init_tracing, participant, point_counts, runner, seed_participant, snapshot_json,
    workers_of,
};
use anyhow::Result;
use chrono::Duration;
use poolstats_sync::SqliteStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn local_files_sync_and_missing_files_use_grace() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("pool");
    std::fs::create_dir_all(root.join("users"))?;
    std::fs::write(
        root.join("users").join("alice"),
        snapshot_json("alice", Duration::minutes(2), &["rig"]).to_string(),
    )?;

    let db = dir.path().join("poolstats.db");
    let store = SqliteStore::open(&db)?;
    seed_participant(&store, "alice", Some(Duration::days(1))).await?;
    seed_participant(&store, "bob", Some(Duration::days(2))).await?;
    seed_participant(&store, "carol", Some(Duration::days(10))).await?;

    let source = format!("file://{}", root.display());
    let (runner, clock) = runner(fast_config(&source, &db).build()?)?;

    let summary = runner.run_once().await?;
    assert_eq!(summary.participants, 3);
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.grace_holds, 1);
    assert_eq!(summary.deactivated, 1);
    assert_eq!(summary.errors, 0);

    assert_eq!(workers_of(&store, "alice").await?.len(), 1);
    assert_eq!(point_counts(&store, "alice").await?, (1, 1));

    let bob = participant(&store, "bob").await?.expect("seeded");
    assert!(bob.is_active, "missing file inside grace keeps the participant");
    assert_eq!(point_counts(&store, "bob").await?, (0, 0));
    assert!(!participant(&store, "carol").await?.expect("seeded").is_active);

    clock.advance(Duration::days(5));
    let later = runner.run_once().await?;
    assert_eq!(later.deactivated, 1, "bob's window has closed");
    assert!(!participant(&store, "bob").await?.expect("seeded").is_active);

    assert!(runner.fetch_metrics().local_reads >= 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bare_path_source_resolves_to_local_root() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("pool");
    std::fs::create_dir_all(root.join("users"))?;
    std::fs::write(
        root.join("users").join("dave"),
        snapshot_json("dave", Duration::minutes(2), &["a", "b"]).to_string(),
    )?;

    let db = dir.path().join("poolstats.db");
    let store = SqliteStore::open(&db)?;
    seed_participant(&store, "dave", None).await?;

    let source = root.to_string_lossy().into_owned();
    let (runner, _clock) = runner(fast_config(&source, &db).build()?)?;
    let summary = runner.run_once().await?;

    assert_eq!(summary.synced, 1);
    assert_eq!(summary.workers, 2);
    assert_eq!(point_counts(&store, "dave").await?, (1, 2));
    Ok(())
}
