// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub const ITEMS_ATTEMPTED: &str = "harvest_items_attempted_total";
pub const ITEMS_SUCCEEDED: &str = "harvest_items_succeeded_total";
pub const ITEMS_FAILED: &str = "harvest_items_failed_total";
pub const SESSIONS_RECYCLED: &str = "harvest_sessions_recycled_total";
pub const PAGES_COLLECTED: &str = "harvest_pages_collected_total";

/// 安装 Prometheus 导出器
///
/// # 参数
///
/// * `addr` - 监听地址，例如 `0.0.0.0:9000`
pub fn init_metrics(addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = addr.parse()?;

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return Ok(());
    }

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

pub fn record_attempt(succeeded: bool) {
    counter!(ITEMS_ATTEMPTED).increment(1);
    if succeeded {
        counter!(ITEMS_SUCCEEDED).increment(1);
    } else {
        counter!(ITEMS_FAILED).increment(1);
    }
}

pub fn record_session_recycled(worker_id: usize) {
    counter!(SESSIONS_RECYCLED, "worker" => worker_id.to_string()).increment(1);
}

pub fn record_page_collected() {
    counter!(PAGES_COLLECTED).increment(1);
}
