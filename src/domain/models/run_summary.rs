// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// 运行摘要
///
/// 每次运行结束都会返回，即使运行失败；`status` 区分两种情况。
/// `cumulative_*` 来自运行结束时的进度账本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cumulative_succeeded: u64,
    pub cumulative_failed: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            total: 0,
            succeeded: 0,
            failed: 0,
            cumulative_succeeded: 0,
            cumulative_failed: 0,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
