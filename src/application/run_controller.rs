// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::dto::job_status::JobStatusDto;
use crate::application::use_cases::run_pipeline::{Pipeline, RunOptions};
use crate::domain::models::run_summary::RunSummary;

/// 触发接口错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunError {
    #[error("已有运行正在进行")]
    AlreadyRunning,
}

/// 运行控制器
///
/// 同一时刻最多只有一次运行；运行结束后保留最后一次的摘要供查询
pub struct RunController {
    pipeline: Arc<Pipeline>,
    state: Arc<Mutex<JobStatusDto>>,
}

/// 运行期间持有的令牌，释放时清除 `running` 标记
struct RunGuard {
    state: Arc<Mutex<JobStatusDto>>,
    finished: bool,
}

impl RunGuard {
    fn finish(mut self, summary: &RunSummary) {
        let mut state = self.state.lock();
        state.running = false;
        state.last_run = Some(summary.timestamp);
        state.error = summary.error.clone();
        state.last_result = Some(summary.clone());
        self.finished = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.state.lock();
            state.running = false;
            state.error = Some("run aborted before completion".to_string());
        }
    }
}

impl RunController {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            state: Arc::new(Mutex::new(JobStatusDto::default())),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn begin(&self) -> Result<RunGuard, RunError> {
        let mut state = self.state.lock();
        if state.running {
            return Err(RunError::AlreadyRunning);
        }
        state.running = true;
        state.error = None;
        Ok(RunGuard {
            state: self.state.clone(),
            finished: false,
        })
    }

    /// 在后台任务中启动一次运行
    ///
    /// # 返回值
    ///
    /// * `Ok(JoinHandle)` - 已启动，句柄在运行结束时给出摘要
    /// * `Err(RunError::AlreadyRunning)` - 已有运行正在进行
    pub fn start(&self, options: RunOptions) -> Result<JoinHandle<RunSummary>, RunError> {
        let guard = self.begin()?;
        let pipeline = self.pipeline.clone();
        info!("Run started in background");
        Ok(tokio::spawn(async move {
            let summary = pipeline.run(options).await;
            guard.finish(&summary);
            summary
        }))
    }

    /// 在当前任务中执行一次运行，与 `start` 互斥
    pub async fn run_sync(&self, options: RunOptions) -> Result<RunSummary, RunError> {
        let guard = self.begin()?;
        let summary = self.pipeline.run(options).await;
        guard.finish(&summary);
        Ok(summary)
    }

    pub fn status(&self) -> JobStatusDto {
        self.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn last_result(&self) -> Option<RunSummary> {
        self.state.lock().last_result.clone()
    }
}
