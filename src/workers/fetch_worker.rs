// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::settings::Settings;
use crate::domain::models::cookie::StoredCookie;
use crate::domain::models::item::ItemId;
use crate::domain::models::progress::Outcome;
use crate::domain::services::progress_ledger::ProgressLedger;
use crate::engines::traits::{BrowserSession, SessionError, SessionFactory, SessionSpec};
use crate::infrastructure::metrics;
use crate::queue::WorkQueue;
use crate::utils::errors::FetchError;
use crate::workers::download_sink::DownloadSink;
use crate::workers::stats::Stats;

/// 工作器持有的会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active,
    Recycling,
    Failed,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SessionState::NoSession => "no_session",
            SessionState::Active => "active",
            SessionState::Recycling => "recycling",
            SessionState::Failed => "failed",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// 工作器策略参数
#[derive(Debug, Clone)]
pub struct WorkerPolicy {
    /// 每个会话最多下载次数
    pub recycle_after: u32,
    /// 失败后的退避时间
    pub failure_backoff: Duration,
    /// 导航后的固定等待（不轮询下载目录时）
    pub fetch_settle: Duration,
    /// 是否轮询下载目录确认完成
    pub await_download: bool,
    pub download_timeout: Duration,
    pub download_poll: Duration,
    pub headless: bool,
    pub download_dir: PathBuf,
    /// 注入 Cookie 前先访问的站点根地址
    pub base_url: String,
    pub fetch_url_template: String,
}

impl WorkerPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            recycle_after: settings.pipeline.recycle_after.max(1),
            failure_backoff: Duration::from_millis(settings.pipeline.failure_backoff_ms),
            fetch_settle: Duration::from_millis(settings.pipeline.fetch_settle_ms),
            await_download: settings.pipeline.await_download,
            download_timeout: Duration::from_secs(settings.pipeline.download_timeout_secs),
            download_poll: Duration::from_millis(settings.pipeline.download_poll_ms),
            headless: settings.browser.headless,
            download_dir: settings.storage.download_dir.clone(),
            base_url: settings.portal.base_url.clone(),
            fetch_url_template: settings.portal.fetch_url_template.clone(),
        }
    }

    pub fn fetch_url(&self, id: &ItemId) -> String {
        self.fetch_url_template.replace("{id}", id.as_str())
    }

    /// 失败退避时间，附加至多 10% 的随机抖动
    pub fn failure_delay(&self) -> Duration {
        let spread = self.failure_backoff.as_millis() as u64 / 10;
        if spread == 0 {
            return self.failure_backoff;
        }
        self.failure_backoff + Duration::from_millis(rand::random_range(0..=spread))
    }
}

/// 所有工作器共享的协作对象
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<WorkQueue>,
    pub ledger: Arc<ProgressLedger>,
    pub stats: Arc<Stats>,
    pub factory: Arc<dyn SessionFactory>,
    pub cookies: Arc<Vec<StoredCookie>>,
    pub policy: Arc<WorkerPolicy>,
}

/// 工作器退出时的报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub sessions_created: u64,
    pub sessions_recycled: u64,
    /// 单个会话在被替换前完成的最大下载次数
    pub max_fetches_per_session: u32,
}

/// 工作器当前租用的会话及其下载计数
struct LeasedSession {
    session: Box<dyn BrowserSession>,
    fetches: u32,
}

/// 下载工作器
///
/// 独占一个浏览器会话，反复从队列取条目下载，直到观察到队列为空。
/// 会话在达到下载次数上限时回收重建，任何一次下载失败都会丢弃会话。
pub struct FetchWorker {
    id: usize,
    ctx: WorkerContext,
    sink: DownloadSink,
    state: SessionState,
    lease: Option<LeasedSession>,
    report: WorkerReport,
}

impl FetchWorker {
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        let sink = DownloadSink::new(&ctx.policy.download_dir, id);
        Self {
            id,
            ctx,
            sink,
            state: SessionState::NoSession,
            lease: None,
            report: WorkerReport {
                worker_id: id,
                ..Default::default()
            },
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state changed");
            self.state = next;
        }
    }

    /// 运行工作循环直到队列为空
    ///
    /// 无论以何种状态退出，都会尝试关闭持有的会话
    #[instrument(skip(self), fields(worker_id = self.id))]
    pub async fn run(mut self) -> WorkerReport {
        info!("Worker started");

        while let Some(item) = self.ctx.queue.pop() {
            self.process(item).await;
        }

        self.release().await;
        self.transition(SessionState::Terminated);
        info!(
            processed = self.report.processed,
            succeeded = self.report.succeeded,
            failed = self.report.failed,
            sessions = self.report.sessions_created,
            "Worker finished"
        );
        self.report
    }

    async fn process(&mut self, item: ItemId) {
        self.report.processed += 1;

        let outcome = match self.ensure_session().await {
            Ok(()) => self.fetch(&item).await,
            Err(e) => Err(FetchError::Session(e)),
        };

        match outcome {
            Ok(file) => {
                self.ctx.stats.record_success();
                self.report.succeeded += 1;
                Self::record(&self.ctx.ledger, &item, Outcome::Succeeded).await;

                if let Some(lease) = self.lease.as_mut() {
                    lease.fetches += 1;
                    self.report.max_fetches_per_session =
                        self.report.max_fetches_per_session.max(lease.fetches);
                }

                let snapshot = self.ctx.stats.snapshot();
                match file {
                    Some(path) => info!(item_id = %item, "✓ {:?} ({}/{})", path, snapshot.attempted, snapshot.total),
                    None => info!(item_id = %item, "✓ ({}/{})", snapshot.attempted, snapshot.total),
                }
            }
            Err(e) => {
                self.ctx.stats.record_failure();
                self.report.failed += 1;
                warn!(item_id = %item, "✗ {}", e);
                Self::record(&self.ctx.ledger, &item, Outcome::Failed).await;

                self.transition(SessionState::Failed);
                self.release().await;
                sleep(self.ctx.policy.failure_delay()).await;
            }
        }
    }

    /// 写入账本，失败只记录日志
    async fn record(ledger: &ProgressLedger, item: &ItemId, outcome: Outcome) {
        if let Err(e) = ledger.record(item, outcome).await {
            warn!(item_id = %item, "Failed to record {} in ledger: {}", outcome, e);
        }
    }

    /// 保证持有一个可用会话：没有会话或达到回收阈值时重建
    async fn ensure_session(&mut self) -> Result<(), SessionError> {
        let exhausted = self
            .lease
            .as_ref()
            .map(|lease| lease.fetches >= self.ctx.policy.recycle_after)
            .unwrap_or(false);
        if exhausted {
            info!("Recycling session after {} fetches", self.ctx.policy.recycle_after);
            self.transition(SessionState::Recycling);
            self.report.sessions_recycled += 1;
            metrics::record_session_recycled(self.id);
            self.release().await;
        }

        if self.lease.is_some() {
            return Ok(());
        }

        let spec = SessionSpec::new(format!("worker-{}", self.id))
            .headless(self.ctx.policy.headless)
            .download_dir(self.sink.staging_dir());
        let mut session = self.ctx.factory.create(&spec).await?;

        if let Err(e) = Self::transplant_cookies(&self.ctx, session.as_mut()).await {
            if let Err(close_err) = session.close().await {
                debug!("Teardown after failed cookie transplant: {}", close_err);
            }
            return Err(e);
        }

        self.report.sessions_created += 1;
        self.lease = Some(LeasedSession {
            session,
            fetches: 0,
        });
        self.transition(SessionState::Active);
        debug!("Session ready");
        Ok(())
    }

    async fn transplant_cookies(
        ctx: &WorkerContext,
        session: &mut dyn BrowserSession,
    ) -> Result<(), SessionError> {
        session.goto(&ctx.policy.base_url).await?;
        if let Err(e) = session.set_cookies(&ctx.cookies).await {
            warn!("Cookie transplant rejected: {}", e);
        }
        Ok(())
    }

    async fn fetch(&mut self, item: &ItemId) -> Result<Option<PathBuf>, FetchError> {
        let policy = self.ctx.policy.clone();
        if policy.await_download {
            self.sink.prepare().await?;
        }

        let lease = self
            .lease
            .as_mut()
            .ok_or_else(|| FetchError::Session(SessionError::Other("no active session".into())))?;

        match lease.session.goto(&policy.fetch_url(item)).await {
            Ok(()) => {}
            Err(e) if e.is_download_abort() => debug!(item_id = %item, "Navigation became a download"),
            Err(e) => return Err(e.into()),
        }

        if !policy.await_download {
            sleep(policy.fetch_settle).await;
            return Ok(None);
        }

        let file = self
            .sink
            .await_completion(policy.download_timeout, policy.download_poll)
            .await?;
        Ok(Some(self.sink.finalize(item, &file).await?))
    }

    /// 关闭当前会话（忽略关闭错误），回到无会话状态
    async fn release(&mut self) {
        if let Some(mut lease) = self.lease.take() {
            if let Err(e) = lease.session.close().await {
                debug!("Session teardown failed: {}", e);
            }
        }
        self.transition(SessionState::NoSession);
    }
}
