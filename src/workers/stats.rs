// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::infrastructure::metrics;

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// 运行统计
///
/// 四个计数器由同一把锁保护，只增不减，每次运行新建一份
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsSnapshot>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.inner.lock().total = total;
    }

    pub fn record_success(&self) {
        {
            let mut inner = self.inner.lock();
            inner.attempted += 1;
            inner.succeeded += 1;
        }
        metrics::record_attempt(true);
    }

    pub fn record_failure(&self) {
        {
            let mut inner = self.inner.lock();
            inner.attempted += 1;
            inner.failed += 1;
        }
        metrics::record_attempt(false);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock()
    }
}
