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

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::settings::Settings;
use crate::domain::models::progress::ProgressSnapshot;
use crate::domain::models::run_summary::{RunStatus, RunSummary};
use crate::domain::repositories::storage_repository::{StorageError, StorageRepository};
use crate::domain::services::link_collector::LinkCollector;
use crate::domain::services::progress_ledger::ProgressLedger;
use crate::engines::traits::SessionFactory;
use crate::queue::WorkQueue;
use crate::utils::errors::PipelineError;
use crate::workers::{Stats, WorkerContext, WorkerManager, WorkerPolicy, WorkerReport};

/// 单次运行的选项
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// 忽略已持久化的发现列表
    pub force_rediscover: bool,
}

/// 一次完整运行的结果，包含工作器报告
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub reports: Vec<WorkerReport>,
}

/// 下载流水线
///
/// 发现（或复用）链接 -> 读取账本 -> 构造队列 -> 启动工作器池 -> 汇总。
/// 发现阶段完全结束后工作器才会启动。
pub struct Pipeline {
    settings: Arc<Settings>,
    storage: Arc<dyn StorageRepository>,
    factory: Arc<dyn SessionFactory>,
    ledger: Arc<ProgressLedger>,
}

impl Pipeline {
    /// 创建流水线
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    /// * `storage` - 状态文件存储
    /// * `factory` - 浏览器会话工厂
    pub fn new(
        settings: Arc<Settings>,
        storage: Arc<dyn StorageRepository>,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        let ledger = Arc::new(ProgressLedger::new(
            storage.clone(),
            settings.storage.progress_file.clone(),
        ));
        Self {
            settings,
            storage,
            factory,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<ProgressLedger> {
        &self.ledger
    }

    /// 执行一次运行
    ///
    /// # 返回值
    ///
    /// 总是返回运行摘要；运行级错误体现在 `status` 与 `error` 字段中
    pub async fn run(&self, options: RunOptions) -> RunSummary {
        self.run_detailed(options).await.summary
    }

    /// 执行一次运行并返回工作器报告
    pub async fn run_detailed(&self, options: RunOptions) -> RunOutcome {
        match self.execute(options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Run failed: {}", e);
                let mut summary = RunSummary::failure(e.to_string());
                if let Ok(progress) = self.ledger.load().await {
                    summary.cumulative_succeeded = progress.downloaded.len() as u64;
                    summary.cumulative_failed = progress.failed.len() as u64;
                }
                RunOutcome {
                    summary,
                    reports: Vec::new(),
                }
            }
        }
    }

    async fn execute(&self, options: RunOptions) -> Result<RunOutcome, PipelineError> {
        self.settings
            .validate()
            .map_err(|e| PipelineError::InvalidSettings(e.to_string()))?;

        let force = options.force_rediscover || self.settings.pipeline.force_rediscover;
        let collector = LinkCollector::new(self.factory.clone(), self.storage.clone(), &self.settings);
        let collection = collector.collect(force).await;
        if collection.discovery.is_empty() {
            return Err(PipelineError::NoInput);
        }

        let progress = self.ledger.load().await?;
        let queue = Arc::new(WorkQueue::seed(
            &collection.discovery,
            &progress.succeeded_set(),
        ));
        let stats = Arc::new(Stats::new());
        stats.set_total(queue.seeded_len() as u64);

        info!(
            discovered = collection.discovery.len(),
            already_succeeded = progress.downloaded.len(),
            pending = queue.seeded_len(),
            "Work queue seeded"
        );

        let mut reports = Vec::new();
        if queue.is_empty() {
            info!("Nothing pending, all discovered items already succeeded");
        } else {
            if collection.cookies.is_empty() {
                return Err(PipelineError::MissingCookies);
            }
            tokio::fs::create_dir_all(&self.settings.storage.download_dir)
                .await
                .map_err(StorageError::from)?;

            let context = WorkerContext {
                queue: queue.clone(),
                ledger: self.ledger.clone(),
                stats: stats.clone(),
                factory: self.factory.clone(),
                cookies: Arc::new(collection.cookies),
                policy: Arc::new(WorkerPolicy::from_settings(&self.settings)),
            };
            let pool = self.settings.pipeline.workers.min(queue.seeded_len()).max(1);
            let mut manager = WorkerManager::new(
                context,
                Duration::from_millis(self.settings.pipeline.worker_stagger_ms),
            );
            manager.start_workers(pool).await;
            reports = manager.join().await;
            for report in &reports {
                debug!("Worker report: {:?}", report);
            }
        }

        let snapshot = stats.snapshot();
        let cumulative = match self.ledger.load().await {
            Ok(after) => after,
            Err(e) => {
                warn!("Failed to reload ledger for summary: {}", e);
                ProgressSnapshot::default()
            }
        };

        info!(
            total = snapshot.total,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            "Run complete"
        );

        Ok(RunOutcome {
            summary: RunSummary {
                status: RunStatus::Success,
                total: snapshot.total,
                succeeded: snapshot.succeeded,
                failed: snapshot.failed,
                cumulative_succeeded: cumulative.downloaded.len() as u64,
                cumulative_failed: cumulative.failed.len() as u64,
                timestamp: Utc::now(),
                error: None,
            },
            reports,
        })
    }
}
