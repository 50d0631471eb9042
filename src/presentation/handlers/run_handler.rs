// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::{
    application::{
        dto::{job_status::ProgressDto, run_request::RunRequestDto},
        run_controller::RunController,
        use_cases::run_pipeline::RunOptions,
    },
    presentation::errors::AppError,
};

fn options(payload: Option<Json<RunRequestDto>>) -> RunOptions {
    let request = payload.map(|Json(dto)| dto).unwrap_or_default();
    RunOptions {
        force_rediscover: request.force_rediscover,
    }
}

/// 在后台启动一次运行
pub async fn start_run(
    Extension(controller): Extension<Arc<RunController>>,
    payload: Option<Json<RunRequestDto>>,
) -> Result<impl IntoResponse, AppError> {
    controller.start(options(payload))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "message": "Run started in background" })),
    ))
}

/// 同步执行一次运行并返回摘要
pub async fn run_sync(
    Extension(controller): Extension<Arc<RunController>>,
    payload: Option<Json<RunRequestDto>>,
) -> Result<impl IntoResponse, AppError> {
    let summary = controller.run_sync(options(payload)).await?;
    let status = if summary.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(summary)))
}

/// 查询运行状态
pub async fn get_status(Extension(controller): Extension<Arc<RunController>>) -> impl IntoResponse {
    Json(controller.status())
}

/// 获取上一次运行的摘要
pub async fn get_results(Extension(controller): Extension<Arc<RunController>>) -> impl IntoResponse {
    match controller.last_result() {
        Some(summary) => (StatusCode::OK, Json(json!(summary))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No results available yet" })),
        )
            .into_response(),
    }
}

/// 获取进度账本概览
pub async fn get_progress(
    Extension(controller): Extension<Arc<RunController>>,
) -> Result<Json<ProgressDto>, AppError> {
    let snapshot = controller.pipeline().ledger().load().await?;
    Ok(Json(ProgressDto::from(snapshot)))
}
