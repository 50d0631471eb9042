// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::item::ItemId;
use crate::domain::models::progress::ProgressSnapshot;
use crate::domain::models::run_summary::RunSummary;

/// 运行状态查询结果
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobStatusDto {
    /// 是否有运行正在进行
    pub running: bool,
    /// 上一次运行结束的时间
    pub last_run: Option<DateTime<Utc>>,
    /// 上一次运行的摘要
    pub last_result: Option<RunSummary>,
    /// 上一次运行的错误信息
    pub error: Option<String>,
}

/// 进度账本概览
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressDto {
    pub downloaded_count: usize,
    pub failed_count: usize,
    pub downloaded: Vec<ItemId>,
    pub failed: Vec<ItemId>,
}

impl From<ProgressSnapshot> for ProgressDto {
    fn from(snapshot: ProgressSnapshot) -> Self {
        Self {
            downloaded_count: snapshot.downloaded.len(),
            failed_count: snapshot.failed.len(),
            downloaded: snapshot.downloaded,
            failed: snapshot.failed,
        }
    }
}
