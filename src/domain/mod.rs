// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：条目标识、发现列表、进度快照、运行摘要
/// - 仓库接口（repositories）：状态文件的持久化抽象
/// - 服务（services）：链接收集、分页定位与进度账本
pub mod models;
pub mod repositories;
pub mod services;
