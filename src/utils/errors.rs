// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::repositories::storage_repository::StorageError;
use crate::engines::traits::SessionError;

/// 单个条目的下载错误
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),

    #[error("下载超时: {0}")]
    Timeout(String),

    #[error("下载未完成: {0}")]
    Incomplete(String),

    #[error("后处理失败: {0}")]
    PostProcess(String),
}

impl FetchError {
    /// 是否属于超时类错误（导航超时或等待下载超时）
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_) | FetchError::Session(SessionError::Timeout)
        )
    }
}

/// 链接发现错误
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("登录失败: {0}")]
    Authentication(String),

    #[error("会话错误: {0}")]
    Session(#[from] SessionError),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
}

/// 运行级错误，会直接体现在运行摘要中
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("没有可处理的链接")]
    NoInput,

    #[error("缺少登录 Cookie")]
    MissingCookies,

    #[error("配置无效: {0}")]
    InvalidSettings(String),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
}
