// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 条目（item）：条目标识与发现列表
/// - Cookie（cookie）：登录后可迁移到其他会话的认证信息
/// - 进度（progress）：跨运行持久化的下载结果账本
/// - 运行摘要（run_summary）：返回给调用方的统计结果
pub mod cookie;
pub mod item;
pub mod progress;
pub mod run_summary;
