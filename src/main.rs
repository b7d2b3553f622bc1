use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pulse::shutdown::wait_for_signal;
use pulse::{Application, ShutdownManager};
use pulse_core::logging::init_from_config;
use pulse_core::AppConfig;
use tracing::{error, info, warn};

/// 门店健康评分后台计算引擎
#[derive(Debug, Parser)]
#[command(name = "pulse", version, about)]
struct Cli {
    /// 配置文件路径，不指定时按默认路径查找
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,

    /// 启动时写入的演示门店数
    #[arg(long, value_name = "N", default_value_t = 12)]
    demo_locations: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or("默认路径")
        )
    })?;
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }

    init_from_config(&config.observability)?;

    info!("启动门店健康评分引擎");
    info!(
        max_concurrent = config.engine.max_concurrent_tasks,
        scan_interval_seconds = config.engine.scan_interval_seconds,
        staleness_window_seconds = config.engine.staleness_window_seconds,
        "引擎配置已加载"
    );

    let shutdown_grace = Duration::from_secs(config.engine.task_timeout_seconds + 5);
    let app = Arc::new(Application::new(config, cli.demo_locations)?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(shutdown_grace, app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("门店健康评分引擎已退出");
    Ok(())
}
