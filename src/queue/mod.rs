// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供工作器共享的待处理条目队列
pub mod work_queue;

pub use work_queue::WorkQueue;
