// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::run_controller::RunController;
use crate::presentation::handlers::run_handler;

/// 创建应用路由
///
/// # 参数
///
/// * `controller` - 运行控制器
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(controller: Arc<RunController>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(run_handler::get_status))
        .route("/scrape", post(run_handler::start_run))
        .route("/scrape/sync", post(run_handler::run_sync))
        .route("/results", get(run_handler::get_results))
        .route("/progress", get(run_handler::get_progress))
        .layer(Extension(controller))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
