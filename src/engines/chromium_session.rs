// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::settings::BrowserSettings;
use crate::domain::models::cookie::StoredCookie;
use crate::engines::traits::{
    BrowserSession, ElementInfo, SessionError, SessionFactory, SessionSpec,
};

/// 基于 chromiumoxide 的会话工厂
///
/// 每个会话独占一个浏览器进程（或一条远程 CDP 连接）和一个独立的配置目录
pub struct ChromiumSessionFactory {
    settings: BrowserSettings,
}

impl ChromiumSessionFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn create(&self, spec: &SessionSpec) -> Result<Box<dyn BrowserSession>, SessionError> {
        let session = ChromiumSession::open(&self.settings, spec).await?;
        Ok(Box::new(session))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// 会话对浏览器资源的占有方式
#[derive(Debug, Clone, PartialEq)]
enum Ownership {
    /// 本地启动的独占浏览器进程及其配置目录
    Launched { profile_dir: PathBuf },
    /// 远程浏览器中为本会话创建的独立上下文
    ///
    /// 远程浏览器由多个会话共享，关闭时只销毁该上下文
    RemoteContext { context_id: BrowserContextId },
}

impl Ownership {
    fn context_id(&self) -> Option<&BrowserContextId> {
        match self {
            Ownership::Launched { .. } => None,
            Ownership::RemoteContext { context_id } => Some(context_id),
        }
    }

    fn closes_browser(&self) -> bool {
        matches!(self, Ownership::Launched { .. })
    }
}

/// Chromium 浏览器会话
pub struct ChromiumSession {
    label: String,
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    ownership: Ownership,
    request_timeout: Duration,
    navigation_timeout: Duration,
    closed: bool,
}

impl ChromiumSession {
    async fn open(settings: &BrowserSettings, spec: &SessionSpec) -> Result<Self, SessionError> {
        let (mut browser, mut handler, profile_dir) = if let Some(url) = &settings.remote_url {
            info!("[{}] Connecting to remote Chrome instance", spec.label);
            let (browser, handler) = Browser::connect(url.as_str()).await.map_err(|e| {
                SessionError::Launch(format!("Failed to connect to remote Chrome: {}", e))
            })?;
            (browser, handler, None)
        } else {
            let profile_dir = settings
                .profile_root
                .join(format!("{}-{}", spec.label, uuid::Uuid::new_v4()));
            tokio::fs::create_dir_all(&profile_dir)
                .await
                .map_err(|e| SessionError::Launch(format!("Failed to create profile dir: {}", e)))?;

            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(Duration::from_secs(settings.request_timeout_secs))
                .user_data_dir(&profile_dir)
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage");
            if !spec.headless {
                builder = builder.with_head();
            }
            let config = builder.build().map_err(SessionError::Launch)?;

            let (browser, handler) = Browser::launch(config)
                .await
                .map_err(|e| SessionError::Launch(e.to_string()))?;
            (browser, handler, Some(profile_dir))
        };

        // Spawn a handler to process browser events
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let ownership = match profile_dir {
            Some(profile_dir) => Ownership::Launched { profile_dir },
            None => match browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
            {
                Ok(context_id) => Ownership::RemoteContext { context_id },
                Err(e) => {
                    handler.abort();
                    return Err(SessionError::Launch(format!(
                        "Failed to create browser context: {}",
                        e
                    )));
                }
            },
        };

        let prepared = Self::prepare(&browser, spec, ownership.context_id()).await;
        let page = match prepared {
            Ok(page) => page,
            Err(e) => {
                let _ = Self::release_browser(&mut browser, &ownership).await;
                handler.abort();
                if let Ownership::Launched { profile_dir } = &ownership {
                    let _ = tokio::fs::remove_dir_all(profile_dir).await;
                }
                return Err(e);
            }
        };

        debug!("[{}] Browser session ready", spec.label);

        Ok(Self {
            label: spec.label.clone(),
            browser,
            page,
            handler,
            ownership,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
            closed: false,
        })
    }

    async fn prepare(
        browser: &Browser,
        spec: &SessionSpec,
        context_id: Option<&BrowserContextId>,
    ) -> Result<Page, SessionError> {
        if let Some(dir) = &spec.download_dir {
            let params = download_params(dir, context_id)?;
            browser
                .execute(params)
                .await
                .map_err(|e| SessionError::Launch(format!("Failed to set download dir: {}", e)))?;
        }

        browser
            .new_page(target_params(context_id))
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))
    }

    /// 释放会话占有的浏览器资源：本地进程整体关闭，远程只销毁自己的上下文
    async fn release_browser(
        browser: &mut Browser,
        ownership: &Ownership,
    ) -> Result<(), SessionError> {
        match ownership {
            Ownership::Launched { .. } => browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| SessionError::Other(e.to_string())),
            Ownership::RemoteContext { context_id } => browser
                .dispose_browser_context(context_id.clone())
                .await
                .map_err(|e| SessionError::Other(e.to_string())),
        }
    }

    /// Bounds a CDP call; an elapsed bound surfaces as `SessionError::Timeout`.
    async fn bounded<T, E, F>(
        limit: Duration,
        fut: F,
        wrap: fn(String) -> SessionError,
    ) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(wrap(e.to_string())),
            Err(_) => Err(SessionError::Timeout),
        }
    }

    fn elements_script(selector: &str) -> Result<String, SessionError> {
        let selector =
            serde_json::to_string(selector).map_err(|e| SessionError::Other(e.to_string()))?;
        Ok(format!(
            r#"(() => Array.from(document.querySelectorAll({selector})).map(el => ({{
                text: (el.innerText || el.textContent || '').trim(),
                href: el.href || el.getAttribute('href') || null,
                disabled: el.hasAttribute('disabled')
                    || el.getAttribute('aria-disabled') === 'true'
                    || el.classList.contains('disabled')
                    || (!!el.parentElement && el.parentElement.classList.contains('disabled'))
            }})))()"#
        ))
    }
}

impl From<Cookie> for StoredCookie {
    fn from(cookie: Cookie) -> Self {
        Self {
            name: cookie.name,
            value: cookie.value,
            domain: Some(cookie.domain),
            path: Some(cookie.path),
            expires: if cookie.session {
                None
            } else {
                Some(cookie.expires)
            },
            http_only: cookie.http_only,
            secure: cookie.secure,
            same_site: cookie.same_site.map(|s| format!("{:?}", s)),
        }
    }
}

/// 下载行为参数；远程会话限定在自己的上下文内
fn download_params(
    dir: &std::path::Path,
    context_id: Option<&BrowserContextId>,
) -> Result<SetDownloadBehaviorParams, SessionError> {
    let mut builder = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(dir.to_string_lossy().into_owned());
    if let Some(id) = context_id {
        builder = builder.browser_context_id(id.clone());
    }
    builder.build().map_err(SessionError::Launch)
}

fn target_params(context_id: Option<&BrowserContextId>) -> CreateTargetParams {
    let mut params = CreateTargetParams::new("about:blank");
    params.browser_context_id = context_id.cloned();
    params
}

fn to_cookie_param(cookie: &StoredCookie) -> CookieParam {
    let mut param = CookieParam::new(cookie.name.clone(), cookie.value.clone());
    param.domain = cookie.domain.clone();
    param.path = cookie.path.clone();
    param.secure = Some(cookie.secure);
    param.http_only = Some(cookie.http_only);
    param
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        Self::bounded(
            self.navigation_timeout,
            self.page.goto(url),
            SessionError::Navigation,
        )
        .await?;
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), SessionError> {
        Self::bounded(
            self.navigation_timeout,
            self.page.reload(),
            SessionError::Navigation,
        )
        .await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), SessionError> {
        let element = Self::bounded(
            self.request_timeout,
            self.page.find_element(selector),
            SessionError::ElementNotFound,
        )
        .await?;
        Self::bounded(
            self.request_timeout,
            async { element.click().await?.type_str(value).await.map(|_| ()) },
            SessionError::Other,
        )
        .await
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        let element = Self::bounded(
            self.request_timeout,
            self.page.find_element(selector),
            SessionError::ElementNotFound,
        )
        .await?;
        Self::bounded(
            self.request_timeout,
            async { element.click().await.map(|_| ()) },
            SessionError::Other,
        )
        .await
    }

    async fn elements(&mut self, selector: &str) -> Result<Vec<ElementInfo>, SessionError> {
        let script = Self::elements_script(selector)?;
        let result = Self::bounded(
            self.request_timeout,
            self.page.evaluate(script),
            SessionError::Other,
        )
        .await?;
        result
            .into_value::<Vec<ElementInfo>>()
            .map_err(|e| SessionError::Other(format!("Unexpected element payload: {}", e)))
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), SessionError> {
        let elements = Self::bounded(
            self.request_timeout,
            self.page.find_elements(selector),
            SessionError::ElementNotFound,
        )
        .await?;
        let element = elements
            .get(index)
            .ok_or_else(|| SessionError::ElementNotFound(format!("{}[{}]", selector, index)))?;
        Self::bounded(
            self.request_timeout,
            async { element.scroll_into_view().await?.click().await.map(|_| ()) },
            SessionError::Other,
        )
        .await
    }

    async fn cookies(&mut self) -> Result<Vec<StoredCookie>, SessionError> {
        let cookies = Self::bounded(
            self.request_timeout,
            self.page.get_cookies(),
            SessionError::Other,
        )
        .await?;
        Ok(cookies.into_iter().map(StoredCookie::from).collect())
    }

    async fn set_cookies(&mut self, cookies: &[StoredCookie]) -> Result<(), SessionError> {
        let params: Vec<CookieParam> = cookies.iter().map(to_cookie_param).collect();
        Self::bounded(
            self.request_timeout,
            self.page.set_cookies(params),
            SessionError::Other,
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = match tokio::time::timeout(
            self.request_timeout,
            Self::release_browser(&mut self.browser, &self.ownership),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout),
        };
        if self.ownership.closes_browser() {
            let _ = tokio::time::timeout(self.request_timeout, self.browser.wait()).await;
        }
        self.handler.abort();

        if let Ownership::Launched { profile_dir } = &self.ownership {
            if let Err(e) = tokio::fs::remove_dir_all(profile_dir).await {
                warn!(
                    "[{}] Failed to remove profile dir {:?}: {}",
                    self.label, profile_dir, e
                );
            }
        }

        debug!("[{}] Browser session closed", self.label);
        result
    }
}
