use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fantasy_core::AppConfig;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::{AppMode, Application};
use shutdown::ShutdownManager;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Fantasy体育数据解析器调度服务
#[derive(Debug, Parser)]
#[command(name = "fantasy-parsers", version, about = "Fantasy体育数据采集调度系统")]
struct Cli {
    /// 配置文件路径，未指定时尝试 config/fantasy-parsers.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 运行模式
    #[arg(short, long, value_enum, default_value_t = AppMode::All)]
    mode: AppMode,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_name = "LEVEL",
          value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载默认配置失败".to_string(),
    })?;

    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }

    init_logging(&config.observability.log_level, &config.observability.log_format)?;

    info!("启动Fantasy解析器调度服务");
    info!(
        "配置文件: {}",
        cli.config.as_deref().unwrap_or(fantasy_core::config::DEFAULT_CONFIG_PATH)
    );
    info!("运行模式: {:?}", cli.mode);

    let app = Arc::new(Application::new(config, cli.mode).await?);
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    let exited_early = tokio::select! {
        signal = wait_for_shutdown_signal() => {
            signal?;
            None
        }
        finished = &mut app_handle => Some(finished),
    };

    match exited_early {
        None => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
                Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
                Ok(Ok(Err(e))) => error!("应用运行失败: {e:#}"),
                Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
                Err(_) => warn!("应用关闭超时，强制退出"),
            }
        }
        // 未收到信号应用就退出了，通常是API绑定失败
        Some(Ok(Ok(()))) => warn!("应用在收到关闭信号前退出"),
        Some(Ok(Err(e))) => {
            error!("应用运行失败: {e:#}");
            return Err(e);
        }
        Some(Err(e)) => return Err(anyhow::anyhow!("应用任务异常结束: {e}")),
    }

    info!("Fantasy解析器调度服务已退出");
    Ok(())
}

/// 初始化日志系统，`RUST_LOG` 优先于配置的级别
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        _ => return Err(anyhow::anyhow!("不支持的日志格式: {log_format}")),
    }

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("安装Ctrl+C信号处理器失败")?;
                info!("收到Ctrl+C信号");
            },
            _ = terminate.recv() => {
                info!("收到SIGTERM信号");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("安装Ctrl+C信号处理器失败")?;
        info!("收到Ctrl+C信号");
    }

    Ok(())
}
