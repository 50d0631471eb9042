// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

use crate::domain::models::item::{DiscoveryList, ItemId};

/// 工作队列
///
/// 由"发现列表减去账本中已成功的条目"一次性构造，之后只会收缩。
/// 唯一暴露给工作器的修改操作是 `pop`，判空与出队在同一个临界区内完成；
/// 失败的条目不会被放回队列。
#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: Mutex<VecDeque<ItemId>>,
    seeded: usize,
}

impl WorkQueue {
    /// 构造工作队列
    ///
    /// # 参数
    ///
    /// * `discovery` - 发现列表
    /// * `succeeded` - 账本中已成功的条目
    ///
    /// # 返回值
    ///
    /// 按发现顺序排列的待处理条目队列
    pub fn seed(discovery: &DiscoveryList, succeeded: &HashSet<ItemId>) -> Self {
        let pending: VecDeque<ItemId> = discovery
            .ids()
            .iter()
            .filter(|id| !succeeded.contains(*id))
            .cloned()
            .collect();
        let seeded = pending.len();

        Self {
            pending: Mutex::new(pending),
            seeded,
        }
    }

    /// 取出下一个待处理条目，队列为空时返回 `None`
    pub fn pop(&self) -> Option<ItemId> {
        self.pending.lock().pop_front()
    }

    /// 当前剩余数量
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// 构造时的条目数量，即本次运行的 `total`
    pub fn seeded_len(&self) -> usize {
        self.seeded
    }
}
