// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供下载工作器、工作器池管理、下载落地目录和运行统计
pub mod download_sink;
pub mod fetch_worker;
pub mod manager;
pub mod stats;

pub use fetch_worker::{FetchWorker, SessionState, WorkerContext, WorkerPolicy, WorkerReport};
pub use manager::WorkerManager;
pub use stats::{Stats, StatsSnapshot};
