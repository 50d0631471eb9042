// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use harvestrs::application::run_controller::{RunController, RunError};
use harvestrs::application::use_cases::run_pipeline::{Pipeline, RunOptions};
use harvestrs::domain::models::run_summary::RunStatus;
use harvestrs::infrastructure::storage::InMemoryStorage;
use harvestrs::presentation::routes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use super::helpers::fake_portal::{test_settings, FakePortal, PortalScript};
use super::helpers::{seed_discovery, seed_ledger};

/// 构造一个预置了发现列表的控制器；每次下载耗时 `delay`
async fn controller(dir: &std::path::Path, delay: Duration) -> Arc<RunController> {
    let settings = test_settings(dir);
    let storage = Arc::new(InMemoryStorage::new());
    seed_discovery(storage.as_ref(), &settings, &["1", "2", "3", "4"]).await;
    seed_ledger(storage.as_ref(), &settings, &["1"], &[]).await;

    let script = PortalScript {
        fetch_delay: delay,
        ..Default::default()
    };
    let pipeline = Pipeline::new(
        Arc::new(settings),
        storage,
        Arc::new(FakePortal::new(script)),
    );
    Arc::new(RunController::new(Arc::new(pipeline)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_concurrent_start_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(dir.path(), Duration::from_millis(50)).await;

    let handle = controller.start(RunOptions::default()).unwrap();
    assert!(controller.is_running());
    assert_eq!(
        controller.start(RunOptions::default()).unwrap_err(),
        RunError::AlreadyRunning
    );
    assert_eq!(
        controller.run_sync(RunOptions::default()).await.unwrap_err(),
        RunError::AlreadyRunning
    );

    let summary = handle.await.unwrap();
    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.total, 3);

    let status = controller.status();
    assert!(!status.running);
    assert_eq!(status.last_result, Some(summary.clone()));
    assert_eq!(status.last_run, Some(summary.timestamp));
    assert!(status.error.is_none());

    // Idle again, so a new run is accepted
    let second = controller.run_sync(RunOptions::default()).await.unwrap();
    assert_eq!(second.total, 0);
}

#[tokio::test]
async fn test_health_and_empty_results() {
    let dir = tempfile::tempdir().unwrap();
    let app = routes::routes(controller(dir.path(), Duration::ZERO).await);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = app
        .oneshot(Request::builder().uri("/results").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scrape_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(dir.path(), Duration::from_millis(50)).await;
    let app = routes::routes(controller.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scrape")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scrape")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"force_rediscover":false}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["running"], true);

    while controller.is_running() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/results").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await;
    assert_eq!(results["status"], "success");
    assert_eq!(results["total"], 3);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/progress").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let progress = body_json(response).await;
    assert_eq!(progress["downloaded_count"], 4);
    assert_eq!(progress["failed_count"], 0);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scrape/sync")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 0);
}
