// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::settings::{CredentialSettings, PaginationSettings, PortalSettings, Settings};
use crate::domain::models::cookie::StoredCookie;
use crate::domain::models::item::DiscoveryList;
use crate::domain::repositories::storage_repository::{
    load_json, save_json, StorageError, StorageRepository,
};
use crate::domain::services::pagination::{default_locators, locate_next, NextControl, NextPageLocator};
use crate::engines::traits::{BrowserSession, SessionFactory, SessionSpec};
use crate::infrastructure::metrics;
use crate::utils::errors::CollectError;

/// 链接收集结果
#[derive(Debug, Default)]
pub struct Collection {
    /// 去重后的发现列表
    pub discovery: DiscoveryList,
    /// 登录后导出（或从文件读取）的 Cookie
    pub cookies: Vec<StoredCookie>,
    /// 是否直接复用了已持久化的发现列表
    pub reused: bool,
    /// 本次实际遍历的页数
    pages: u32,
}

impl Collection {
    pub fn pages(&self) -> u32 {
        self.pages
    }
}

/// 链接收集器
///
/// 登录一次，从头到尾遍历结果列表，每处理完一页就把当前的发现列表整体写回存储。
/// 遍历中途出错只会提前结束遍历，已经发现的链接仍然保留。
pub struct LinkCollector {
    factory: Arc<dyn SessionFactory>,
    storage: Arc<dyn StorageRepository>,
    portal: PortalSettings,
    credentials: CredentialSettings,
    pagination: PaginationSettings,
    headless: bool,
    links_key: String,
    cookies_key: String,
    locators: Vec<Box<dyn NextPageLocator>>,
    base: Option<Url>,
}

impl LinkCollector {
    /// 创建链接收集器
    ///
    /// # 参数
    ///
    /// * `factory` - 会话工厂
    /// * `storage` - 发现列表与 Cookie 文件所在的存储
    /// * `settings` - 应用配置
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        storage: Arc<dyn StorageRepository>,
        settings: &Settings,
    ) -> Self {
        let base = match Url::parse(&settings.portal.base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Invalid portal.base_url {}: {}", settings.portal.base_url, e);
                None
            }
        };

        Self {
            factory,
            storage,
            portal: settings.portal.clone(),
            credentials: settings.credentials.clone(),
            pagination: settings.pagination.clone(),
            headless: settings.browser.headless,
            links_key: settings.storage.links_file.clone(),
            cookies_key: settings.storage.cookies_file.clone(),
            locators: default_locators(&settings.pagination),
            base,
        }
    }

    /// 读取已持久化的发现列表
    pub async fn load_discovery(&self) -> Result<Option<DiscoveryList>, StorageError> {
        let links = load_json::<Vec<String>>(self.storage.as_ref(), &self.links_key).await?;
        Ok(links.map(|links| DiscoveryList::from_links(links, self.base.clone())))
    }

    /// 读取已持久化的 Cookie
    pub async fn load_cookies(&self) -> Result<Vec<StoredCookie>, StorageError> {
        Ok(load_json::<Vec<StoredCookie>>(self.storage.as_ref(), &self.cookies_key)
            .await?
            .unwrap_or_default())
    }

    /// 获取发现列表
    ///
    /// 存在非空的发现列表且未要求强制重新遍历时直接复用，否则登录并遍历。
    ///
    /// # 参数
    ///
    /// * `force` - 忽略已有的发现列表
    ///
    /// # 返回值
    ///
    /// 永不失败：无法恢复的错误只记录日志，返回空列表或部分列表
    pub async fn collect(&self, force: bool) -> Collection {
        if !force {
            match self.load_discovery().await {
                Ok(Some(discovery)) if !discovery.is_empty() => {
                    info!(
                        "Reusing {} persisted links from {}",
                        discovery.len(),
                        self.links_key
                    );
                    let cookies = self.load_cookies().await.unwrap_or_else(|e| {
                        warn!("Failed to load cookies: {}", e);
                        Vec::new()
                    });
                    return Collection {
                        discovery,
                        cookies,
                        reused: true,
                        pages: 0,
                    };
                }
                Ok(_) => {}
                Err(e) => warn!("Persisted links unreadable, rediscovering: {}", e),
            }
        }

        let mut collection = Collection {
            discovery: DiscoveryList::new(self.base.clone()),
            ..Default::default()
        };

        if !self.credentials.is_configured() {
            error!("Credentials are not configured; skipping link collection");
            return collection;
        }

        let spec = SessionSpec::new("collector").headless(self.headless);
        let mut session = match self.factory.create(&spec).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to create collector session: {}", e);
                return collection;
            }
        };

        if let Err(e) = self.traverse(session.as_mut(), &mut collection).await {
            error!(
                "Link collection aborted after {} pages with {} links: {}",
                collection.pages,
                collection.discovery.len(),
                e
            );
        }

        if let Err(e) = session.close().await {
            debug!("Collector session teardown failed: {}", e);
        }

        info!(
            "Link collection finished: {} links across {} pages",
            collection.discovery.len(),
            collection.pages
        );
        collection
    }

    async fn traverse(
        &self,
        session: &mut dyn BrowserSession,
        collection: &mut Collection,
    ) -> Result<(), CollectError> {
        collection.cookies = self.login(session).await?;

        session.goto(&self.portal.results_url).await?;

        let mut retried_empty = false;
        loop {
            let rows = self.await_rows(session).await?;
            let added = self.harvest_page(session, &mut collection.discovery).await?;
            collection.pages += 1;
            metrics::record_page_collected();
            info!(
                page = collection.pages,
                rows,
                added,
                total = collection.discovery.len(),
                "Collected listing page"
            );

            if collection.pages >= self.pagination.max_pages {
                warn!("Reached max_pages ({}), stopping", self.pagination.max_pages);
                return Ok(());
            }

            match locate_next(&self.locators, session).await? {
                NextControl::Found { selector, index } => {
                    session.click_nth(&selector, index).await?;
                    sleep(self.pagination.settle()).await;
                    retried_empty = false;
                }
                NextControl::Disabled => {
                    info!("Next control disabled, reached the last page");
                    return Ok(());
                }
                NextControl::Absent if rows == 0 && !retried_empty => {
                    warn!("Empty page without next control, reloading once");
                    retried_empty = true;
                    // The reloaded page is counted again on the next pass
                    collection.pages -= 1;
                    session.reload().await?;
                    sleep(self.pagination.settle()).await;
                }
                NextControl::Absent => {
                    info!("No next control found, reached the last page");
                    return Ok(());
                }
            }
        }
    }

    async fn login(&self, session: &mut dyn BrowserSession) -> Result<Vec<StoredCookie>, CollectError> {
        let timeout = self.pagination.render_timeout();

        session.goto(&self.portal.login_url).await?;
        session
            .wait_for(&self.portal.username_selector, timeout)
            .await
            .map_err(|e| CollectError::Authentication(format!("login form not shown: {}", e)))?;

        session
            .fill(&self.portal.username_selector, &self.credentials.email)
            .await?;
        session
            .fill(&self.portal.password_selector, &self.credentials.password)
            .await?;
        session.click(&self.portal.submit_selector).await?;

        session
            .wait_for(&self.portal.post_login_marker, timeout)
            .await
            .map_err(|e| CollectError::Authentication(format!("post-login marker missing: {}", e)))?;

        let cookies = session.cookies().await?;
        if cookies.is_empty() {
            warn!("Login produced no cookies");
        }
        save_json(self.storage.as_ref(), &self.cookies_key, &cookies).await?;
        info!("Logged in, saved {} cookies", cookies.len());
        Ok(cookies)
    }

    /// 等待列表渲染完成，超时后刷新一次；再次超时视为空页
    async fn await_rows(&self, session: &mut dyn BrowserSession) -> Result<usize, CollectError> {
        if let Some(rows) = self.poll_rows(session).await? {
            return Ok(rows);
        }
        warn!("Listing did not render in time, reloading");
        session.reload().await?;
        Ok(self.poll_rows(session).await?.unwrap_or(0))
    }

    /// 轮询行数，直到行数非零且连续 `stable_polls` 次不变
    async fn poll_rows(&self, session: &mut dyn BrowserSession) -> Result<Option<usize>, CollectError> {
        let deadline = Instant::now() + self.pagination.render_timeout();
        let required = self.pagination.stable_polls.max(1);
        let mut last = 0;
        let mut stable = 0;

        loop {
            let rows = session.count(&self.pagination.row_selector).await?;
            if rows == 0 {
                stable = 0;
            } else if rows == last {
                stable += 1;
            } else {
                stable = 1;
            }
            last = rows;

            if stable >= required {
                return Ok(Some(rows));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(self.pagination.poll_interval()).await;
        }
    }

    /// 提取当前页的详情链接并追加到发现列表，随后整体持久化
    async fn harvest_page(
        &self,
        session: &mut dyn BrowserSession,
        discovery: &mut DiscoveryList,
    ) -> Result<usize, CollectError> {
        let links = session
            .elements(&self.pagination.link_selector)
            .await?
            .into_iter()
            .filter_map(|element| element.href)
            .filter(|href| href.contains(&self.portal.item_pattern));

        let added = discovery.extend(links);
        save_json(self.storage.as_ref(), &self.links_key, discovery.links()).await?;
        Ok(added)
    }
}
