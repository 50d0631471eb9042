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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含门户站点、登录凭据、分页、浏览器、流水线、存储和服务器等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 门户站点配置
    pub portal: PortalSettings,
    /// 登录凭据
    pub credentials: CredentialSettings,
    /// 分页遍历配置
    pub pagination: PaginationSettings,
    /// 浏览器会话配置
    pub browser: BrowserSettings,
    /// 下载流水线配置
    pub pipeline: PipelineSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 服务器配置
    pub server: ServerSettings,
}

/// 门户站点配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSettings {
    /// 站点根地址，会话创建后先访问此地址再注入 Cookie
    pub base_url: String,
    /// 登录页地址
    pub login_url: String,
    /// 结果列表页地址
    pub results_url: String,
    /// 详情链接必须包含的片段
    pub item_pattern: String,
    /// 下载地址模板，`{id}` 会被替换为条目标识
    pub fetch_url_template: String,
    /// 用户名输入框选择器
    pub username_selector: String,
    /// 密码输入框选择器
    pub password_selector: String,
    /// 登录按钮选择器
    pub submit_selector: String,
    /// 登录成功后出现的标记元素
    pub post_login_marker: String,
}

impl PortalSettings {
    /// 生成指定条目的下载地址
    pub fn fetch_url(&self, id: &str) -> String {
        self.fetch_url_template.replace("{id}", id)
    }
}

/// 登录凭据
#[derive(Clone, Deserialize, Default)]
pub struct CredentialSettings {
    pub email: String,
    pub password: String,
}

impl CredentialSettings {
    pub fn is_configured(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// 分页遍历配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSettings {
    /// 列表行选择器
    pub row_selector: String,
    /// 行内链接选择器
    pub link_selector: String,
    /// "下一页"控件的文本变体（不区分大小写，精确匹配）
    pub next_labels: Vec<String>,
    /// 按文本匹配时搜索的元素范围
    pub next_label_scope: String,
    /// "下一页"控件的 CSS 选择器，按顺序尝试
    pub next_selectors: Vec<String>,
    /// 等待列表渲染的超时时间（毫秒）
    pub render_timeout_ms: u64,
    /// 行数轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 行数连续保持不变多少次视为渲染完成
    pub stable_polls: u32,
    /// 翻页后的固定等待时间（毫秒）
    pub settle_ms: u64,
    /// 最大遍历页数
    pub max_pages: u32,
}

impl PaginationSettings {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// 浏览器会话配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 是否无头模式
    pub headless: bool,
    /// 远程 CDP 地址（设置后连接远程浏览器而不是本地启动）
    pub remote_url: Option<String>,
    /// CDP 请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 单次导航超时时间（秒）
    pub navigation_timeout_secs: u64,
    /// 浏览器独立配置目录的根路径
    pub profile_root: PathBuf,
}

/// 下载流水线配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// 并发工作器数量
    pub workers: usize,
    /// 每个会话下载多少次后强制重建
    pub recycle_after: u32,
    /// 下载失败后的退避时间（毫秒）
    pub failure_backoff_ms: u64,
    /// 导航后的固定等待时间（毫秒）
    pub fetch_settle_ms: u64,
    /// 是否轮询下载目录确认文件落地
    pub await_download: bool,
    /// 等待下载完成的超时时间（秒）
    pub download_timeout_secs: u64,
    /// 下载目录轮询间隔（毫秒）
    pub download_poll_ms: u64,
    /// 工作器启动间隔（毫秒）
    pub worker_stagger_ms: u64,
    /// 是否忽略已有的链接文件重新遍历
    pub force_rediscover: bool,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 状态文件所在目录
    pub data_dir: String,
    /// 链接列表文件名
    pub links_file: String,
    /// 进度文件名
    pub progress_file: String,
    /// Cookie 文件名
    pub cookies_file: String,
    /// 下载目录
    pub download_dir: PathBuf,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}` 与 `HARVEST__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("HARVEST").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 仅包含内置默认值的配置构建器
    pub fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            // Portal
            .set_default("portal.base_url", "https://hotelprojectleads.com/")?
            .set_default("portal.login_url", "https://hotelprojectleads.com/login")?
            .set_default(
                "portal.results_url",
                "https://hotelprojectleads.com/members/lead-search-results?region=na&types=255&stages=15&incExp=on",
            )?
            .set_default("portal.item_pattern", "lead-detail")?
            .set_default(
                "portal.fetch_url_template",
                "https://hotelprojectleads.com/members/lead/csv?id={id}",
            )?
            .set_default("portal.username_selector", "#user_login")?
            .set_default("portal.password_selector", "#user_pass")?
            .set_default("portal.submit_selector", "#wp-submit")?
            .set_default("portal.post_login_marker", "body")?
            .set_default("credentials.email", "")?
            .set_default("credentials.password", "")?
            // Pagination
            .set_default("pagination.row_selector", "tr")?
            .set_default("pagination.link_selector", "tr a")?
            .set_default(
                "pagination.next_labels",
                vec!["next", ">", "next page", "»", "›"],
            )?
            .set_default("pagination.next_label_scope", "a")?
            .set_default(
                "pagination.next_selectors",
                vec!["a.next", "a[rel='next']", ".pagination a.next"],
            )?
            .set_default("pagination.render_timeout_ms", 20_000)?
            .set_default("pagination.poll_interval_ms", 500)?
            .set_default("pagination.stable_polls", 2)?
            .set_default("pagination.settle_ms", 2_000)?
            .set_default("pagination.max_pages", 10_000)?
            // Browser
            .set_default("browser.headless", true)?
            .set_default("browser.request_timeout_secs", 30)?
            .set_default("browser.navigation_timeout_secs", 90)?
            .set_default("browser.profile_root", "./storage/profiles")?
            // Pipeline
            .set_default("pipeline.workers", 5)?
            .set_default("pipeline.recycle_after", 100)?
            .set_default("pipeline.failure_backoff_ms", 2_000)?
            .set_default("pipeline.fetch_settle_ms", 2_000)?
            .set_default("pipeline.await_download", false)?
            .set_default("pipeline.download_timeout_secs", 60)?
            .set_default("pipeline.download_poll_ms", 500)?
            .set_default("pipeline.worker_stagger_ms", 500)?
            .set_default("pipeline.force_rediscover", false)?
            // Storage
            .set_default("storage.data_dir", "./storage")?
            .set_default("storage.links_file", "all_lead_links.json")?
            .set_default("storage.progress_file", "download_progress.json")?
            .set_default("storage.cookies_file", "cookies.json")?
            .set_default("storage.download_dir", "./lead_downloads")?
            // Server
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)
    }

    /// 校验配置的取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Message(
                "pipeline.workers must be at least 1".to_string(),
            ));
        }
        if self.pipeline.recycle_after == 0 {
            return Err(ConfigError::Message(
                "pipeline.recycle_after must be at least 1".to_string(),
            ));
        }
        if !self.portal.fetch_url_template.contains("{id}") {
            return Err(ConfigError::Message(
                "portal.fetch_url_template must contain {id}".to_string(),
            ));
        }
        Ok(())
    }
}
