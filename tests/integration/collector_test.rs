// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use harvestrs::domain::models::cookie::StoredCookie;
use harvestrs::domain::models::item::ItemId;
use harvestrs::domain::repositories::storage_repository::load_json;
use harvestrs::domain::services::link_collector::LinkCollector;
use harvestrs::infrastructure::storage::{InMemoryStorage, LocalStorage};
use std::collections::HashSet;
use std::sync::Arc;

use super::helpers::fake_portal::{lead_link, test_settings, FakePortal, PortalScript};

fn page(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| lead_link(id)).collect()
}

#[tokio::test]
async fn test_traversal_dedups_across_pages_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());

    let mut first = page(&["1", "2"]);
    // Non-detail anchors in rows are ignored
    first.push("https://portal.test/members/profile".to_string());
    let script = PortalScript::with_pages(vec![first, page(&["2", "3"]), page(&["4"])]);
    let portal = Arc::new(FakePortal::new(script));

    let collector = LinkCollector::new(portal.clone(), storage.clone(), &settings);
    let collection = collector.collect(false).await;

    assert!(!collection.reused);
    assert_eq!(collection.pages(), 3);
    assert_eq!(
        collection.discovery.ids(),
        &[
            ItemId::from("1"),
            ItemId::from("2"),
            ItemId::from("3"),
            ItemId::from("4")
        ]
    );

    let persisted: Vec<String> = load_json(storage.as_ref(), &settings.storage.links_file)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted, collection.discovery.links());

    let cookies: Vec<StoredCookie> = load_json(storage.as_ref(), &settings.storage.cookies_file)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cookies.len(), 1);
    assert_eq!(portal.counters.closed(), 1);
}

#[tokio::test]
async fn test_interrupted_traversal_keeps_exactly_completed_pages() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(LocalStorage::new(dir.path().join("state")));

    let script = PortalScript {
        pages: vec![page(&["1", "2"]), page(&["3"]), page(&["4", "5"]), page(&["6"])],
        fail_on_page: Some(2),
        ..Default::default()
    };
    let portal = Arc::new(FakePortal::new(script));

    let collector = LinkCollector::new(portal.clone(), storage.clone(), &settings);
    let collection = collector.collect(false).await;

    assert_eq!(collection.pages(), 2);
    let persisted: Vec<String> = load_json(storage.as_ref(), &settings.storage.links_file)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted, page(&["1", "2", "3"]));
    // The session is still torn down after the abort
    assert_eq!(portal.counters.closed(), 1);

    // A later run reuses the partial list without logging in again
    let again = collector.collect(false).await;
    assert!(again.reused);
    assert_eq!(again.discovery.len(), 3);
    assert_eq!(portal.counters.created(), 1);
}

#[tokio::test]
async fn test_force_rediscover_ignores_persisted_list() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());
    let portal = Arc::new(FakePortal::new(PortalScript::with_pages(vec![page(&["1"])])));
    let collector = LinkCollector::new(portal.clone(), storage.clone(), &settings);

    collector.collect(false).await;
    let forced = collector.collect(true).await;

    assert!(!forced.reused);
    assert_eq!(portal.counters.created(), 2);
}

#[tokio::test]
async fn test_slow_render_recovers_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());

    let script = PortalScript {
        pages: vec![page(&["1"]), page(&["2", "3"])],
        blank_until_reload: HashSet::from([1]),
        ..Default::default()
    };
    let portal = Arc::new(FakePortal::new(script));
    let collection = LinkCollector::new(portal, storage, &settings)
        .collect(false)
        .await;

    assert_eq!(collection.discovery.len(), 3);
    assert_eq!(collection.pages(), 2);
}

#[tokio::test]
async fn test_disabled_next_control_ends_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());

    let script = PortalScript {
        pages: vec![page(&["1"]), page(&["2"])],
        disabled_last: true,
        ..Default::default()
    };
    let collection = LinkCollector::new(
        Arc::new(FakePortal::new(script)),
        Arc::new(InMemoryStorage::new()),
        &settings,
    )
    .collect(false)
    .await;

    assert_eq!(collection.pages(), 2);
    assert_eq!(collection.discovery.len(), 2);
}

#[tokio::test]
async fn test_empty_last_page_is_retried_once() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());

    let script = PortalScript::with_pages(vec![page(&["1"]), Vec::new()]);
    let collection = LinkCollector::new(
        Arc::new(FakePortal::new(script)),
        Arc::new(InMemoryStorage::new()),
        &settings,
    )
    .collect(false)
    .await;

    assert_eq!(collection.discovery.len(), 1);
    assert_eq!(collection.pages(), 2);
}

#[tokio::test]
async fn test_max_pages_bounds_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    settings.pagination.max_pages = 2;

    let script = PortalScript::with_pages(vec![page(&["1"]), page(&["2"]), page(&["3"])]);
    let collection = LinkCollector::new(
        Arc::new(FakePortal::new(script)),
        Arc::new(InMemoryStorage::new()),
        &settings,
    )
    .collect(false)
    .await;

    assert_eq!(collection.pages(), 2);
    assert_eq!(collection.discovery.len(), 2);
}

#[tokio::test]
async fn test_failed_login_returns_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    let storage = Arc::new(InMemoryStorage::new());

    let script = PortalScript {
        pages: vec![page(&["1"])],
        login_fails: true,
        ..Default::default()
    };
    let portal = Arc::new(FakePortal::new(script));
    let collection = LinkCollector::new(portal.clone(), storage.clone(), &settings)
        .collect(false)
        .await;

    assert!(collection.discovery.is_empty());
    assert!(collection.cookies.is_empty());
    let persisted: Option<Vec<String>> = load_json(storage.as_ref(), &settings.storage.links_file)
        .await
        .unwrap();
    assert!(persisted.is_none());
    assert_eq!(portal.counters.closed(), 1);
}
