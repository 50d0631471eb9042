// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use harvestrs::application::use_cases::run_pipeline::{Pipeline, RunOptions};
use harvestrs::domain::models::item::ItemId;
use harvestrs::domain::models::run_summary::RunStatus;
use harvestrs::domain::repositories::storage_repository::StorageRepository;
use harvestrs::infrastructure::storage::InMemoryStorage;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::helpers::failing_storage::FailingStorage;
use super::helpers::fake_portal::{lead_link, test_settings, FakePortal, PortalScript};
use super::helpers::{ids, seed_discovery, seed_ledger};

fn as_strs(ids: &[String]) -> Vec<&str> {
    ids.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn test_pre_succeeded_items_are_never_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());
    let all = ids(0..10);
    seed_discovery(storage.as_ref(), &settings, &as_strs(&all)).await;
    seed_ledger(storage.as_ref(), &settings, &["2", "5", "8"], &[]).await;

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.total, 7);
    assert_eq!(summary.succeeded + summary.failed, 7);
    assert_eq!(summary.cumulative_succeeded, 10);

    let fetched = portal.counters.fetched();
    assert_eq!(fetched.len(), 7);
    for pre in ["2", "5", "8"] {
        assert!(!fetched.iter().any(|id| id == pre), "{} was re-fetched", pre);
    }
    assert!(portal.counters.peak_live_sessions.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_rerun_with_everything_succeeded_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());
    let all = ids(0..5);
    seed_discovery(storage.as_ref(), &settings, &as_strs(&all)).await;

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());

    let first = pipeline.run(RunOptions::default()).await;
    assert_eq!(first.succeeded, 5);
    let sessions_after_first = portal.counters.created();

    let second = pipeline.run(RunOptions::default()).await;
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(second.total, 0);
    assert_eq!(second.succeeded + second.failed, 0);
    assert_eq!(second.cumulative_succeeded, 5);
    assert_eq!(portal.counters.created(), sessions_after_first);
    assert_eq!(portal.counters.fetched().len(), 5);
}

#[tokio::test]
async fn test_timeout_marks_failed_and_replaces_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.pipeline.workers = 1;
    let storage = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["a", "x", "b"]).await;

    let script = PortalScript {
        fetch_failures: HashSet::from(["x".to_string()]),
        ..Default::default()
    };
    let portal = Arc::new(FakePortal::new(script));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let progress = pipeline.ledger().load().await.unwrap();
    assert_eq!(progress.failed, vec![ItemId::from("x")]);
    assert!(!progress.is_succeeded(&ItemId::from("x")));

    // One session for "a" and "x", a fresh one for "b"
    assert_eq!(portal.counters.created(), 2);
    assert_eq!(portal.counters.closed(), 2);
    assert_eq!(portal.counters.fetched(), vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_failed_item_is_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.pipeline.workers = 1;
    let storage: Arc<dyn StorageRepository> = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["1", "2"]).await;
    seed_ledger(storage.as_ref(), &settings, &["1"], &["2"]).await;

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.total, 1);
    assert_eq!(summary.succeeded, 1);
    let progress = pipeline.ledger().load().await.unwrap();
    // Historical failure stays alongside the later success
    assert!(progress.is_failed(&ItemId::from("2")));
    assert!(progress.is_succeeded(&ItemId::from("2")));
}

#[tokio::test]
async fn test_sessions_recycle_at_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.pipeline.workers = 1;
    settings.pipeline.recycle_after = 4;
    let storage = Arc::new(InMemoryStorage::new());
    let all = ids(0..10);
    seed_discovery(storage.as_ref(), &settings, &as_strs(&all)).await;

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let outcome = pipeline.run_detailed(RunOptions::default()).await;

    assert_eq!(outcome.summary.succeeded, 10);
    assert_eq!(
        portal
            .counters
            .max_fetches_per_session
            .load(Ordering::SeqCst),
        4
    );
    // 4 + 4 + 2
    assert_eq!(portal.counters.created(), 3);
    assert_eq!(portal.counters.closed(), 3);

    let report = &outcome.reports[0];
    assert_eq!(report.sessions_created, 3);
    assert_eq!(report.sessions_recycled, 2);
    assert_eq!(report.max_fetches_per_session, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_outcomes_are_all_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.pipeline.workers = 4;
    let storage = Arc::new(InMemoryStorage::new());
    let all = ids(0..40);
    seed_discovery(storage.as_ref(), &settings, &as_strs(&all)).await;

    let failing: HashSet<String> = ["3", "11", "19", "27", "35"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let script = PortalScript {
        fetch_failures: failing.clone(),
        fetch_delay: Duration::from_millis(2),
        ..Default::default()
    };
    let portal = Arc::new(FakePortal::new(script));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.total, 40);
    assert_eq!(summary.succeeded, 35);
    assert_eq!(summary.failed, 5);

    let progress = pipeline.ledger().load().await.unwrap();
    assert_eq!(progress.downloaded.len(), 35);
    assert_eq!(progress.failed.len(), 5);
    let succeeded: HashSet<_> = progress.downloaded.iter().collect();
    assert!(progress.failed.iter().all(|id| !succeeded.contains(id)));
    assert!(progress
        .failed
        .iter()
        .all(|id| failing.contains(id.as_str())));
}

#[tokio::test]
async fn test_session_launch_failure_counts_as_failed_item() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.pipeline.workers = 1;
    let storage = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["1", "2", "3"]).await;

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    portal
        .counters
        .fail_next_creates
        .store(1, Ordering::SeqCst);
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 2);
    let progress = pipeline.ledger().load().await.unwrap();
    assert_eq!(progress.failed, vec![ItemId::from("1")]);
}

#[tokio::test]
async fn test_ledger_write_errors_do_not_stop_workers() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(FailingStorage::new(settings.storage.progress_file.clone()));
    seed_discovery(storage.as_ref(), &settings, &["1", "2", "3", "4"]).await;

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    let pipeline = Pipeline::new(Arc::new(settings), storage.clone(), portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(storage.failed_writes(), 4);
    assert_eq!(summary.cumulative_succeeded, 0);
}

#[tokio::test]
async fn test_empty_discovery_is_a_run_level_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.credentials.password.clear();

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    let pipeline = Pipeline::new(
        Arc::new(settings),
        Arc::new(InMemoryStorage::new()),
        portal.clone(),
    );
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.status, RunStatus::Error);
    assert!(summary.error.is_some());
    assert_eq!(summary.total, 0);
    assert_eq!(portal.counters.created(), 0);
}

#[tokio::test]
async fn test_missing_cookies_is_a_run_level_error() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["1"]).await;
    storage.delete(&settings.storage.cookies_file).await.unwrap();

    let portal = Arc::new(FakePortal::new(PortalScript::default()));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.status, RunStatus::Error);
    assert!(portal.counters.fetched().is_empty());
}

#[tokio::test]
async fn test_full_run_discovers_then_fetches() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());

    let script = PortalScript::with_pages(vec![
        vec![lead_link("1"), lead_link("2")],
        vec![lead_link("3")],
    ]);
    let portal = Arc::new(FakePortal::new(script));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    // Collector session plus one per worker
    assert_eq!(portal.counters.created(), 3);
    assert_eq!(portal.counters.closed(), 3);
}

/// 等待下载落地的配置：轮询间隔压缩到毫秒级
fn awaiting_settings(dir: &std::path::Path) -> harvestrs::config::settings::Settings {
    let mut settings = test_settings(dir);
    settings.pipeline.workers = 1;
    settings.pipeline.await_download = true;
    settings.pipeline.download_timeout_secs = 1;
    settings.pipeline.download_poll_ms = 5;
    settings
}

/// 下载目录中的成品文件（不含各工作器的暂存目录）
fn artifacts(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_awaited_downloads_are_moved_under_item_id() {
    let dir = tempfile::tempdir().unwrap();
    let settings = awaiting_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["1", "2", "3", "7", "9"]).await;

    let script = PortalScript {
        download_name: Some("export.csv".to_string()),
        missing_downloads: HashSet::from(["7".to_string()]),
        ..Default::default()
    };
    let portal = Arc::new(FakePortal::new(script));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!((summary.total, summary.succeeded, summary.failed), (5, 4, 1));
    assert_eq!(artifacts(dir.path()), vec!["1.csv", "2.csv", "3.csv", "9.csv"]);
    assert_eq!(std::fs::read_to_string(dir.path().join("9.csv")).unwrap(), "9");

    // The missing file is a timeout: recorded as failed, session replaced for "9"
    let progress = pipeline.ledger().load().await.unwrap();
    assert_eq!(progress.failed, vec![ItemId::from("7")]);
    assert_eq!(portal.counters.created(), 2);
    assert_eq!(portal.counters.closed(), 2);
}

#[tokio::test]
async fn test_redownload_replaces_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let settings = awaiting_settings(dir.path());
    std::fs::write(dir.path().join("4.txt"), "stale").unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["4"]).await;

    let script = PortalScript {
        download_name: Some("export.csv".to_string()),
        ..Default::default()
    };
    let pipeline = Pipeline::new(
        Arc::new(settings),
        storage,
        Arc::new(FakePortal::new(script)),
    );
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(artifacts(dir.path()), vec!["4.csv"]);
    assert_eq!(std::fs::read_to_string(dir.path().join("4.csv")).unwrap(), "4");
}

#[tokio::test]
async fn test_finalize_failure_counts_as_failed_item() {
    let dir = tempfile::tempdir().unwrap();
    let settings = awaiting_settings(dir.path());
    // A non-empty directory squats on the destination of "5"
    let blocker = dir.path().join("5.csv");
    std::fs::create_dir_all(&blocker).unwrap();
    std::fs::write(blocker.join("keep"), "x").unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["5", "6"]).await;

    let script = PortalScript {
        download_name: Some("export.csv".to_string()),
        ..Default::default()
    };
    let portal = Arc::new(FakePortal::new(script));
    let pipeline = Pipeline::new(Arc::new(settings), storage, portal.clone());
    let summary = pipeline.run(RunOptions::default()).await;

    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    let progress = pipeline.ledger().load().await.unwrap();
    assert_eq!(progress.failed, vec![ItemId::from("5")]);
    assert!(progress.is_succeeded(&ItemId::from("6")));
    assert!(dir.path().join("6.csv").is_file());
    assert_eq!(portal.counters.created(), 2);
}
