// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;

use crate::config::settings::PaginationSettings;
use crate::engines::traits::{BrowserSession, SessionError};

/// 定位"下一页"控件的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextControl {
    /// 找到可点击的控件：第 `index` 个匹配 `selector` 的元素
    Found { selector: String, index: usize },
    /// 控件存在但呈禁用状态，视为最后一页
    Disabled,
    /// 本策略没有找到控件
    Absent,
}

/// "下一页"定位策略
#[async_trait]
pub trait NextPageLocator: Send + Sync {
    async fn locate(&self, session: &mut dyn BrowserSession) -> Result<NextControl, SessionError>;

    fn name(&self) -> &'static str;
}

/// 按链接文本精确匹配（去除空白、不区分大小写）
pub struct TextLabelLocator {
    labels: Vec<String>,
    scope: String,
}

impl TextLabelLocator {
    /// # 参数
    ///
    /// * `labels` - 文本变体
    /// * `scope` - 在哪些元素的文本中查找，通常是 `a`
    pub fn new(labels: &[String], scope: &str) -> Self {
        Self {
            labels: labels.iter().map(|l| l.trim().to_lowercase()).collect(),
            scope: scope.to_string(),
        }
    }
}

#[async_trait]
impl NextPageLocator for TextLabelLocator {
    async fn locate(&self, session: &mut dyn BrowserSession) -> Result<NextControl, SessionError> {
        let anchors = session.elements(&self.scope).await?;
        let hit = anchors
            .iter()
            .position(|a| self.labels.contains(&a.text.trim().to_lowercase()));

        Ok(match hit {
            Some(index) if anchors[index].disabled => NextControl::Disabled,
            Some(index) => NextControl::Found {
                selector: self.scope.clone(),
                index,
            },
            None => NextControl::Absent,
        })
    }

    fn name(&self) -> &'static str {
        "text_label"
    }
}

/// 按 CSS 选择器依次尝试，取第一个匹配元素
pub struct SelectorLocator {
    selectors: Vec<String>,
}

impl SelectorLocator {
    pub fn new(selectors: &[String]) -> Self {
        Self {
            selectors: selectors.to_vec(),
        }
    }
}

#[async_trait]
impl NextPageLocator for SelectorLocator {
    async fn locate(&self, session: &mut dyn BrowserSession) -> Result<NextControl, SessionError> {
        for selector in &self.selectors {
            let matches = session.elements(selector).await?;
            if let Some(first) = matches.first() {
                if first.disabled {
                    return Ok(NextControl::Disabled);
                }
                return Ok(NextControl::Found {
                    selector: selector.clone(),
                    index: 0,
                });
            }
        }
        Ok(NextControl::Absent)
    }

    fn name(&self) -> &'static str {
        "selector"
    }
}

/// 按配置构造定位策略，顺序即优先级
pub fn default_locators(settings: &PaginationSettings) -> Vec<Box<dyn NextPageLocator>> {
    vec![
        Box::new(TextLabelLocator::new(
            &settings.next_labels,
            &settings.next_label_scope,
        )),
        Box::new(SelectorLocator::new(&settings.next_selectors)),
    ]
}

/// 依次尝试各策略，第一个给出明确结论（找到或禁用）的策略胜出
pub async fn locate_next(
    locators: &[Box<dyn NextPageLocator>],
    session: &mut dyn BrowserSession,
) -> Result<NextControl, SessionError> {
    for locator in locators {
        match locator.locate(session).await? {
            NextControl::Absent => continue,
            control => {
                tracing::debug!("Next control located by {} strategy: {:?}", locator.name(), control);
                return Ok(control);
            }
        }
    }
    Ok(NextControl::Absent)
}
