// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 链接收集（link_collector）：登录并遍历结果列表，产出发现列表
/// - 分页定位（pagination）："下一页"控件的定位策略
/// - 进度账本（progress_ledger）：跨运行的条目结果记录
pub mod link_collector;
pub mod pagination;
pub mod progress_ledger;
