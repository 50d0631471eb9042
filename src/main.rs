// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use harvestrs::application::run_controller::RunController;
use harvestrs::application::use_cases::run_pipeline::{Pipeline, RunOptions};
use harvestrs::config::settings::Settings;
use harvestrs::engines::chromium_session::ChromiumSessionFactory;
use harvestrs::infrastructure::storage::LocalStorage;
use harvestrs::presentation::routes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use harvestrs::utils::telemetry;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(
    name = "harvestrs",
    version,
    about = "Collect portal item links and fetch every pending artifact"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the pipeline once and print the summary as JSON (default).
    Run {
        /// Ignore the persisted link list and traverse the listing again.
        #[arg(long)]
        force_rediscover: bool,
    },
    /// Serve the HTTP trigger interface.
    Serve,
}

impl Cli {
    fn command(self) -> Command {
        self.command.unwrap_or(Command::Run {
            force_rediscover: false,
        })
    }
}

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并执行一次运行或启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting harvestrs...");

    let command = Cli::parse().command();

    // Initialize Prometheus Metrics
    if let Ok(addr) = std::env::var("HARVEST_METRICS_ADDR") {
        harvestrs::infrastructure::metrics::init_metrics(&addr)?;
    }

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    settings.validate()?;
    info!("Configuration loaded");

    // 3. Initialize Components
    let storage = Arc::new(LocalStorage::new(&settings.storage.data_dir));
    let factory = Arc::new(ChromiumSessionFactory::new(settings.browser.clone()));
    let pipeline = Arc::new(Pipeline::new(settings.clone(), storage, factory));

    match command {
        Command::Run { force_rediscover } => {
            let summary = pipeline.run(RunOptions { force_rediscover }).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.is_success() {
                std::process::exit(1);
            }
        }
        Command::Serve => {
            let controller = Arc::new(RunController::new(pipeline));
            let app = routes::routes(controller);

            let addr = format!("{}:{}", settings.server.host, settings.server.port);
            let listener = TcpListener::bind(&addr).await?;
            info!("Server listening on {}", addr);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
