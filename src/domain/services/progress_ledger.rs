// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::models::item::ItemId;
use crate::domain::models::progress::{Outcome, ProgressSnapshot};
use crate::domain::repositories::storage_repository::{
    load_json, save_json, StorageError, StorageRepository,
};

/// 进度账本
///
/// 每条结果都走一遍"读取-合并-整体写回"，整个序列由一把互斥锁串行化，
/// 多个工作器并发记录时不会丢失更新。
pub struct ProgressLedger {
    storage: Arc<dyn StorageRepository>,
    key: String,
    write_lock: Mutex<()>,
}

impl ProgressLedger {
    /// 创建进度账本
    ///
    /// # 参数
    ///
    /// * `storage` - 存储仓库
    /// * `key` - 账本文档的键（文件名）
    pub fn new(storage: Arc<dyn StorageRepository>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// 读取账本，不存在时返回空快照
    pub async fn load(&self) -> Result<ProgressSnapshot, StorageError> {
        Ok(load_json::<ProgressSnapshot>(self.storage.as_ref(), &self.key)
            .await?
            .unwrap_or_default())
    }

    /// 记录一条结果
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 已持久化（或本就存在，无需写入）
    /// * `Err(StorageError)` - 读取或写回失败，调用方记录日志后继续
    pub async fn record(&self, id: &ItemId, outcome: Outcome) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = self.load().await?;
        if !snapshot.merge(id, outcome) {
            debug!("Ledger already holds {} as {}", id, outcome);
            return Ok(());
        }
        save_json(self.storage.as_ref(), &self.key, &snapshot).await
    }
}
