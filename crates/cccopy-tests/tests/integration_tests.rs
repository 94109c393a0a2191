//! Integration tests for CCCopy
//!
//! These tests drive the full Download / Upload / Save pipeline over two
//! real Git working trees, covering the end-to-end scenarios a deployed
//! team would hit: fresh bootstrap, local edits, remote updates,
//! conflicts, stale locks and the central `.gitignore` guard.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cccopy_engine::{RefreshConfig, RefreshEngine, UpdateResult};
use cccopy_sync::{lock, StateCache, SyncEngine, TrackedFilesCache};
use cccopy_tests::TestProject;
use cccopy_types::{Error, FileState};

async fn state_of(engine: &SyncEngine, rel_path: &str) -> FileState {
    engine
        .classifier()
        .state_of(rel_path)
        .await
        .expect("classify")
        .expect("row emitted")
}

#[tokio::test]
async fn test_fresh_bootstrap_downloads_everything() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    let outcome = engine.download().await.expect("download");

    assert_eq!(project.read_work("src/a.txt"), "A");
    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.new_files, vec!["src/a.txt".to_string()]);

    // Work got exactly one auto-commit for the synced files.
    let log = project.work_repo().log(None).await.expect("work log");
    assert_eq!(log.len(), 1);

    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Same);
}

#[tokio::test]
async fn test_local_edit_then_upload() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    project.write_work("src/a.txt", "A'");
    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Modified);

    let head_before = project
        .prod_repo()
        .head_commit()
        .await
        .expect("head")
        .expect("production has commits");

    let outcome = engine.upload("m1").await.expect("upload");
    assert_eq!(outcome.uploaded, vec!["src/a.txt".to_string()]);
    assert_eq!(project.read_prod("src/a.txt"), "A'");

    // HEAD advanced by exactly one commit, authored by the invoking user
    // and committed by the fixed production identity.
    let log = project.prod_repo().log(None).await.expect("prod log");
    assert_eq!(log[0].message, "m1");
    assert_eq!(log[0].author, whoami::username());
    let head_after = project.prod_repo().head_commit().await.unwrap().unwrap();
    assert_ne!(head_before, head_after);

    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Same);
}

#[tokio::test]
async fn test_saved_edit_still_uploads() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    project.write_work("src/a.txt", "A'");
    let saved = engine.save("wip").await.expect("save");
    assert_eq!(saved.committed, vec!["src/a.txt".to_string()]);

    // A committed local edit is still a local edit.
    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Modified);

    let outcome = engine.upload("publish").await.expect("upload");
    assert_eq!(outcome.uploaded, vec!["src/a.txt".to_string()]);
    assert_eq!(project.read_prod("src/a.txt"), "A'");
}

#[tokio::test]
async fn test_remote_update_without_local_edit() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("first download");

    project.teammate_upload("src/a.txt", "A''", "teammate change").await;
    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Updated);

    engine.download().await.expect("second download");
    assert_eq!(project.read_work("src/a.txt"), "A''");
    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Same);
}

#[tokio::test]
async fn test_conflict_leaves_work_untouched() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    project.write_work("src/a.txt", "X");
    project.teammate_upload("src/a.txt", "Y", "remote edit").await;
    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Conflicted);

    let commits_before = project.work_repo().log(None).await.unwrap().len();
    let outcome = engine.download().await.expect("download with conflict");

    assert_eq!(outcome.conflicts, vec!["src/a.txt".to_string()]);
    assert_eq!(project.read_work("src/a.txt"), "X");
    // No auto-commit happened for the conflicted path.
    let commits_after = project.work_repo().log(None).await.unwrap().len();
    assert_eq!(commits_before, commits_after);

    // The conflict survives the download until it is resolved.
    assert_eq!(state_of(&engine, "src/a.txt").await, FileState::Conflicted);
}

#[tokio::test]
async fn test_upload_refuses_conflicts() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    project.write_work("src/a.txt", "X");
    project.teammate_upload("src/a.txt", "Y", "remote edit").await;

    let err = engine.upload("clobber attempt").await.unwrap_err();
    match err {
        Error::Conflict { paths } => assert_eq!(paths, vec!["src/a.txt".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    // Production kept the teammate's content.
    assert_eq!(project.read_prod("src/a.txt"), "Y");
}

#[tokio::test]
async fn test_stale_lock_is_reclaimed_by_pipeline() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    // A crashed process left a 400-second-old lock behind.
    let lock_dir = lock::lock_dir_path(&project.config.production_dir, "production");
    std::fs::create_dir_all(&lock_dir).unwrap();
    let dead_epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
        - 400_000;
    std::fs::write(
        lock_dir.join("owner"),
        format!("deadhost:1:{dead_epoch_ms}:ghost\n"),
    )
    .unwrap();

    let engine = project.engine().with_lock_timeout(Duration::from_secs(5));
    engine.download().await.expect("download reclaims stale lock");
    assert_eq!(project.read_work("src/a.txt"), "A");
    assert!(!lock_dir.exists());
}

#[tokio::test]
async fn test_held_lock_times_out_with_exit_code_2() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let _held = lock::with_lock(
        &project.config.production_dir,
        "production",
        Duration::from_secs(5),
    )
    .await
    .expect("holder");

    let engine = project.engine().with_lock_timeout(Duration::from_millis(300));
    let err = engine.download().await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_gitignore_guard_on_upload() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    let production_gitignore = project.read_prod(".gitignore");

    // User edits both a source file and the managed .gitignore.
    project.write_work("src/a.txt", "A'");
    project.write_work(".gitignore", "sneaky-pattern\n");

    let outcome = engine.upload("m").await.expect("upload");
    assert!(outcome.gitignore_violation);
    // Production's .gitignore is byte-identical to its pre-upload content
    // and work's copy was restored from it.
    assert_eq!(project.read_prod(".gitignore"), production_gitignore);
    assert_eq!(project.read_work(".gitignore"), production_gitignore);
    // The other modified file still went out in the same pass.
    assert_eq!(outcome.uploaded, vec!["src/a.txt".to_string()]);
    assert_eq!(project.read_prod("src/a.txt"), "A'");
}

#[tokio::test]
async fn test_download_is_idempotent() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");
    project.write_prod("docs/readme.md", "hello");

    let engine = project.engine();
    engine.download().await.expect("first download");
    let commits_after_first = project.work_repo().log(None).await.unwrap().len();
    let prod_head = project.prod_repo().head_commit().await.unwrap();

    let outcome = engine.download().await.expect("second download");
    assert_eq!(outcome.stats.updated, 0);
    assert_eq!(
        project.work_repo().log(None).await.unwrap().len(),
        commits_after_first
    );
    assert_eq!(project.prod_repo().head_commit().await.unwrap(), prod_head);
}

#[tokio::test]
async fn test_direct_production_edit_is_salvaged() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    // Someone edits production directly, bypassing cccopy.
    project.write_prod("src/a.txt", "direct edit");

    let outcome = engine.upload("noop").await.expect("upload");
    assert!(outcome.salvaged_direct_edits);
    // The salvage commit recorded the edit before anything else ran.
    let log = project.prod_repo().log(None).await.unwrap();
    assert!(log.iter().any(|c| c.message == "auto: salvage direct edits"));
}

#[tokio::test]
async fn test_background_salvage_is_throttled() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    project.write_prod("src/a.txt", "direct edit one");
    assert!(engine.salvage_production_edits(false).await.expect("first check"));

    // A second background check inside the throttle window is a no-op,
    // even though another direct edit landed.
    project.write_prod("src/a.txt", "direct edit two");
    assert!(!engine.salvage_production_edits(false).await.expect("throttled"));

    // Forced checks (pipeline callers) bypass the throttle.
    assert!(engine.salvage_production_edits(true).await.expect("forced"));
}

#[tokio::test]
async fn test_excluded_files_never_travel() {
    let project = TestProject::with_patterns(
        vec!["src/**".to_string()],
        vec!["**/*.log".to_string()],
    );
    project.write_prod("src/a.txt", "A");
    project.write_prod("src/noise.log", "shhh");
    project.write_prod("outside.txt", "not a source");

    let engine = project.engine();
    engine.download().await.expect("download");

    assert_eq!(project.read_work("src/a.txt"), "A");
    assert!(!project.work_path("src/noise.log").exists());
    assert!(!project.work_path("outside.txt").exists());
}

#[tokio::test]
async fn test_save_skips_files_outside_sources() {
    let project = TestProject::with_patterns(vec!["src/**".to_string()], Vec::new());
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");

    project.write_work("src/a.txt", "A'");
    project.write_work("scratch.txt", "not tracked");

    let outcome = engine.save("local work").await.expect("save");
    assert_eq!(outcome.committed, vec!["src/a.txt".to_string()]);
    assert_eq!(outcome.skipped, vec!["scratch.txt".to_string()]);
}

#[tokio::test]
async fn test_refresh_engine_tracks_a_live_work_tree() {
    let project = TestProject::new();
    project.write_prod("a.txt", "A");

    let sync_engine = project.engine();
    sync_engine.download().await.expect("download");

    let refresh_config = RefreshConfig {
        watch_interval: Duration::from_millis(200),
        ..RefreshConfig::default()
    };
    let (mut refresh, mut updates) = RefreshEngine::new(
        project.config.clone(),
        refresh_config,
        Arc::new(StateCache::new()),
        Arc::new(TrackedFilesCache::new()),
    );
    refresh.start();

    // Phase one: the scan publishes a pending row immediately.
    let rows = refresh.refresh("").expect("refresh");
    assert!(rows.iter().any(|r| r.rel_path == "a.txt"));

    // Phase two: a worker classifies it as in sync. Other rows (the
    // managed .gitignore) may classify first.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline - tokio::time::Instant::now();
        let update = tokio::time::timeout(remaining, updates.recv())
            .await
            .expect("classification never arrived")
            .expect("queue closed");
        if update.rel_path == "a.txt" {
            assert_eq!(update.result, UpdateResult::State(FileState::Same));
            break;
        }
    }

    // The watcher notices a local edit and re-classifies without a new
    // refresh request.
    project.write_work("a.txt", "A edited");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let remaining = deadline - tokio::time::Instant::now();
        let update = tokio::time::timeout(remaining, updates.recv())
            .await
            .expect("watcher never reported the edit")
            .expect("queue closed");
        if update.result == UpdateResult::State(FileState::Modified) {
            assert_eq!(update.rel_path, "a.txt");
            break;
        }
    }

    refresh.stop().await;
}

#[tokio::test]
async fn test_histories_after_round_trip() {
    let project = TestProject::new();
    project.write_prod("src/a.txt", "A");

    let engine = project.engine();
    engine.download().await.expect("download");
    project.write_work("src/a.txt", "A'");
    engine.upload("published").await.expect("upload");

    let production = engine.production_history(Some(10)).await.expect("prod history");
    assert_eq!(production[0].message, "published");

    let work = engine.work_history(Some(10)).await.expect("work history");
    assert!(!work.is_empty());
}
