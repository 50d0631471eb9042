// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::domain::models::item::ItemId;
use crate::utils::errors::FetchError;

/// 浏览器尚未写完的文件后缀
const IN_PROGRESS_SUFFIXES: [&str; 3] = ["crdownload", "part", "tmp"];

/// 工作器独占的下载落地目录
///
/// 浏览器下载到 `download_dir/.worker-{n}`，完成后移动为 `download_dir/{id}.{ext}`
#[derive(Debug, Clone)]
pub struct DownloadSink {
    staging: PathBuf,
    target: PathBuf,
}

impl DownloadSink {
    pub fn new(download_dir: &Path, worker_id: usize) -> Self {
        Self {
            staging: download_dir.join(format!(".worker-{}", worker_id)),
            target: download_dir.to_path_buf(),
        }
    }

    /// 浏览器的下载目录
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// 创建目录并清空暂存区，保证之后出现的文件都属于下一次下载
    pub async fn prepare(&self) -> Result<(), FetchError> {
        fs::create_dir_all(&self.staging)
            .await
            .map_err(|e| FetchError::PostProcess(format!("create {:?}: {}", self.staging, e)))?;

        let mut entries = fs::read_dir(&self.staging)
            .await
            .map_err(|e| FetchError::PostProcess(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FetchError::PostProcess(e.to_string()))?
        {
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            if let Err(e) = removed {
                debug!("Failed to clear {:?}: {}", path, e);
            }
        }
        Ok(())
    }

    /// 轮询暂存区直到出现已完成的文件
    ///
    /// # 返回值
    ///
    /// * `Ok(PathBuf)` - 最新写完的文件
    /// * `Err(FetchError::Incomplete)` - 超时时仍有未写完的文件
    /// * `Err(FetchError::Timeout)` - 超时时没有任何文件
    pub async fn await_completion(
        &self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<PathBuf, FetchError> {
        let deadline = Instant::now() + timeout;
        loop {
            let (finished, in_progress) = self.scan().await?;
            if !in_progress {
                if let Some(path) = finished {
                    return Ok(path);
                }
            }
            if Instant::now() >= deadline {
                return Err(if in_progress {
                    FetchError::Incomplete(format!("still downloading after {:?}", timeout))
                } else {
                    FetchError::Timeout(format!("no file after {:?}", timeout))
                });
            }
            sleep(poll_interval).await;
        }
    }

    /// 把下载好的文件移动到最终位置，覆盖同一条目的旧文件
    pub async fn finalize(&self, id: &ItemId, file: &Path) -> Result<PathBuf, FetchError> {
        let stem = id.file_stem();
        let name = match file.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem.clone(),
        };
        let destination = self.target.join(&name);

        let mut entries = fs::read_dir(&self.target)
            .await
            .map_err(|e| FetchError::PostProcess(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FetchError::PostProcess(e.to_string()))?
        {
            let path = entry.path();
            let same_item = path.is_file()
                && path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str())
                && path != destination;
            if same_item {
                fs::remove_file(&path)
                    .await
                    .map_err(|e| FetchError::PostProcess(format!("replace {:?}: {}", path, e)))?;
            }
        }

        fs::rename(file, &destination)
            .await
            .map_err(|e| FetchError::PostProcess(format!("rename to {:?}: {}", destination, e)))?;
        Ok(destination)
    }

    /// 返回最新的已完成文件，以及是否存在未写完的文件
    async fn scan(&self) -> Result<(Option<PathBuf>, bool), FetchError> {
        let mut entries = match fs::read_dir(&self.staging).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((None, false)),
            Err(e) => return Err(FetchError::PostProcess(e.to_string())),
        };

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        let mut in_progress = false;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FetchError::PostProcess(e.to_string()))?
        {
            let path = entry.path();
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let partial = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IN_PROGRESS_SUFFIXES.contains(&e))
                .unwrap_or(false);
            if partial {
                in_progress = true;
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map(|(t, _)| modified >= *t).unwrap_or(true) {
                newest = Some((modified, path));
            }
        }
        Ok((newest.map(|(_, path)| path), in_progress))
    }
}
