// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::workers::fetch_worker::{FetchWorker, WorkerContext, WorkerReport};

/// 工作管理器
///
/// 启动固定数量的下载工作器并等待它们全部退出，运行期间不调整池大小
pub struct WorkerManager {
    context: WorkerContext,
    stagger: Duration,
    handles: Vec<JoinHandle<WorkerReport>>,
}

impl WorkerManager {
    pub fn new(context: WorkerContext, stagger: Duration) -> Self {
        Self {
            context,
            stagger,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 依次启动指定数量的工作器，相邻两个之间间隔 `stagger`，避免同时拉起多个浏览器
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub async fn start_workers(&mut self, count: usize) {
        for id in 1..=count {
            if id > 1 && !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }
            let worker = FetchWorker::new(id, self.context.clone());
            self.handles.push(tokio::spawn(worker.run()));
        }
        info!("Started {} workers", count);
    }

    /// 等待所有工作器退出
    ///
    /// # 返回值
    ///
    /// 正常退出的工作器报告；异常终止的工作器只记录日志
    pub async fn join(&mut self) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles.drain(..) {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Worker task ended abnormally: {}", e),
            }
        }
        reports
    }
}
