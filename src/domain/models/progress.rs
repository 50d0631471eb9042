// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::item::ItemId;

/// 单个条目的下载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "succeeded"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

/// 进度账本快照
///
/// 持久化格式为 `{"downloaded": [...], "failed": [...]}`。
/// `downloaded` 中的条目不会再次入队；`failed` 只是历史记录，
/// 同一条目可以在之后的运行中成功，从而同时出现在两个列表里。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub downloaded: Vec<ItemId>,
    #[serde(default)]
    pub failed: Vec<ItemId>,
}

impl ProgressSnapshot {
    /// 合并一条结果
    ///
    /// # 返回值
    ///
    /// 快照发生变化时返回 `true`
    pub fn merge(&mut self, id: &ItemId, outcome: Outcome) -> bool {
        let target = match outcome {
            Outcome::Succeeded => &mut self.downloaded,
            Outcome::Failed => &mut self.failed,
        };
        if target.contains(id) {
            return false;
        }
        target.push(id.clone());
        true
    }

    pub fn succeeded_set(&self) -> HashSet<ItemId> {
        self.downloaded.iter().cloned().collect()
    }

    pub fn is_succeeded(&self, id: &ItemId) -> bool {
        self.downloaded.contains(id)
    }

    pub fn is_failed(&self, id: &ItemId) -> bool {
        self.failed.contains(id)
    }
}
