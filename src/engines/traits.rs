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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::cookie::StoredCookie;

/// 会话错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 浏览器启动或连接失败
    #[error("Browser launch failed: {0}")]
    Launch(String),
    /// 导航失败
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// 元素未找到
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl SessionError {
    /// 导航因响应转为下载而被中止
    ///
    /// Chromium 在地址返回附件时以 `net::ERR_ABORTED` 结束导航，此时下载已经开始
    pub fn is_download_abort(&self) -> bool {
        matches!(self, SessionError::Navigation(message) if message.contains("ERR_ABORTED"))
    }
}

/// 页面元素的只读快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// 去除首尾空白后的可见文本
    #[serde(default)]
    pub text: String,
    /// 解析后的绝对链接（非链接元素为空）
    #[serde(default)]
    pub href: Option<String>,
    /// 是否呈禁用状态（`disabled` 属性、`aria-disabled`、`disabled` 样式类）
    #[serde(default)]
    pub disabled: bool,
}

/// 会话创建参数
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// 会话标签，用于日志和配置目录命名
    pub label: String,
    /// 是否无头模式
    pub headless: bool,
    /// 浏览器下载目录
    pub download_dir: Option<PathBuf>,
}

impl SessionSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            headless: true,
            download_dir: None,
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }
}

/// 浏览器会话特质
///
/// 一个会话对应一个远程浏览器上下文，同一时刻只被一个调用方独占
#[async_trait]
pub trait BrowserSession: Send {
    /// 导航到指定地址
    async fn goto(&mut self, url: &str) -> Result<(), SessionError>;

    /// 刷新当前页面
    async fn reload(&mut self) -> Result<(), SessionError>;

    /// 向输入框填写文本
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), SessionError>;

    /// 点击第一个匹配的元素
    async fn click(&mut self, selector: &str) -> Result<(), SessionError>;

    /// 获取所有匹配元素的快照
    async fn elements(&mut self, selector: &str) -> Result<Vec<ElementInfo>, SessionError>;

    /// 滚动到第 `index` 个匹配元素并点击
    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), SessionError>;

    /// 导出当前会话的 Cookie
    async fn cookies(&mut self) -> Result<Vec<StoredCookie>, SessionError>;

    /// 注入 Cookie
    async fn set_cookies(&mut self, cookies: &[StoredCookie]) -> Result<(), SessionError>;

    /// 关闭会话并释放资源
    async fn close(&mut self) -> Result<(), SessionError>;

    /// 匹配元素的数量
    async fn count(&mut self, selector: &str) -> Result<usize, SessionError> {
        Ok(self.elements(selector).await?.len())
    }

    /// 轮询等待元素出现
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count(selector).await? > 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

/// 会话工厂特质
///
/// 只负责按参数构造一个配置完整的会话，自身不保存状态
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// 创建新会话
    async fn create(&self, spec: &SessionSpec) -> Result<Box<dyn BrowserSession>, SessionError>;

    /// 工厂名称
    fn name(&self) -> &'static str;
}
