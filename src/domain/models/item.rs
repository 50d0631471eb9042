// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// 条目标识
///
/// 从列表行链接中提取的稳定键，唯一对应一个可下载的产物。
/// 优先取查询参数 `id`，否则取最后一个非空路径段。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 从链接中提取条目标识
    ///
    /// # 参数
    ///
    /// * `link` - 绝对地址，或相对于 `base` 的地址
    /// * `base` - 解析相对地址时使用的站点根地址
    ///
    /// # 返回值
    ///
    /// 无法解析或既没有 `id` 参数也没有路径段时返回 `None`
    pub fn from_link(link: &str, base: Option<&Url>) -> Option<Self> {
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(link).ok()?,
            Err(_) => return None,
        };

        if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
            if !id.is_empty() {
                return Some(Self(id.into_owned()));
            }
        }

        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(|segment| Self(segment.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 适合作为文件名的形式
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 发现列表
///
/// 一次遍历产生的有序、去重的链接序列。存储形式为原始链接字符串数组，
/// 去重依据是链接提取出的条目标识；顺序对下游没有语义。
#[derive(Debug, Clone, Default)]
pub struct DiscoveryList {
    links: Vec<String>,
    ids: Vec<ItemId>,
    seen: HashSet<ItemId>,
    base: Option<Url>,
}

impl DiscoveryList {
    pub fn new(base: Option<Url>) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// 从已持久化的链接数组重建发现列表，重复条目只保留第一次出现
    pub fn from_links(links: impl IntoIterator<Item = String>, base: Option<Url>) -> Self {
        let mut list = Self::new(base);
        for link in links {
            list.push(link);
        }
        list
    }

    /// 追加一个链接
    ///
    /// # 返回值
    ///
    /// 链接可解析且其条目标识此前未出现时返回 `true`
    pub fn push(&mut self, link: String) -> bool {
        let Some(id) = ItemId::from_link(&link, self.base.as_ref()) else {
            return false;
        };
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.links.push(link);
        self.ids.push(id);
        true
    }

    /// 批量追加，返回新增数量
    pub fn extend(&mut self, links: impl IntoIterator<Item = String>) -> usize {
        let mut added = 0;
        for link in links {
            if self.push(link) {
                added += 1;
            }
        }
        added
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
