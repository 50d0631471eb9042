// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节：
/// - 指标（metrics）：运行计数器与 Prometheus 导出
/// - 存储（storage）：状态文件的本地与内存实现
///
/// 基础设施层依赖于领域层的抽象接口，
/// 确保领域层不受技术实现的影响。
pub mod metrics;
pub mod storage;
