// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 编排一次完整运行，提供运行触发与状态查询
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含条目、账本、运行摘要等模型以及链接收集服务
pub mod domain;

/// 引擎模块
///
/// 浏览器会话抽象与 Chromium 实现
pub mod engines;

/// 基础设施模块
///
/// 提供状态文件存储和指标导出
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应
pub mod presentation;

/// 队列模块
///
/// 工作器共享的待处理条目队列
pub mod queue;

/// 工具模块
///
/// 提供错误类型和日志初始化
pub mod utils;

/// 工作器模块
///
/// 下载工作器与工作器池
pub mod workers;
