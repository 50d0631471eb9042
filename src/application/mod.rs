// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 编排链接收集、账本、队列与工作器池完成一次运行，
/// 并提供互斥的运行触发与状态查询
pub mod dto;
pub mod run_controller;
pub mod use_cases;
