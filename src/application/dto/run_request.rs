// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 触发运行的请求
///
/// 请求体可以省略，省略时使用配置中的默认值
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct RunRequestDto {
    /// 忽略已持久化的链接列表，重新遍历
    #[serde(default)]
    pub force_rediscover: bool,
}
