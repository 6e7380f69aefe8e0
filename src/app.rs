use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fantasy_api::{create_app, AppState};
use fantasy_core::{AppConfig, ParserRegistry, RunLogRepository as _};
use fantasy_dispatcher::{HealthMonitor, LogAlertSink, ParserScheduler, SchedulerHandle};
use fantasy_infrastructure::{
    install_prometheus_recorder, spawn_metrics_upkeep, DatabaseManager, MetricsCollector,
};
use fantasy_worker::{build_parser_registry, TaskExecutionManager, TaskTracker, WorkerPool};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

/// 进程重启后遗留的 running 日志写入的说明
const INTERRUPTED_RUN_MESSAGE: &str = "进程重启，运行被中断";

/// 留给进行中运行的收尾时间，需小于主进程的关闭超时
const POOL_DRAIN_TIMEOUT: Duration = Duration::from_secs(20);

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(10);

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AppMode {
    /// 调度器、健康检查和API
    All,
    /// 仅API（手动运行仍在本进程执行）
    Api,
    /// 仅调度器和健康检查
    Scheduler,
}

impl AppMode {
    fn runs_scheduler(self) -> bool {
        matches!(self, AppMode::All | AppMode::Scheduler)
    }

    fn runs_api(self) -> bool {
        matches!(self, AppMode::All | AppMode::Api)
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    database: DatabaseManager,
    registry: Arc<ParserRegistry>,
    pool: Arc<WorkerPool>,
    tracker: TaskTracker,
    metrics: MetricsCollector,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database.run_migrations().await.context("初始化数据库表结构失败")?;

        if mode.runs_scheduler() {
            let interrupted = database
                .run_log_repository()
                .fail_interrupted_runs(INTERRUPTED_RUN_MESSAGE)
                .await
                .context("清理中断的运行日志失败")?;
            if interrupted > 0 {
                warn!("{} 条运行日志因进程重启被标记为失败", interrupted);
            }
        }

        let registry = Arc::new(
            build_parser_registry(&config.upstream, database.player_repository())
                .context("构建解析器注册表失败")?,
        );

        let metrics = MetricsCollector::new();
        let manager = Arc::new(TaskExecutionManager::new(
            Arc::clone(&registry),
            database.run_log_repository(),
            metrics.clone(),
            &config.worker,
        ));
        let tracker = TaskTracker::new(config.worker.result_ttl());
        let pool = Arc::new(WorkerPool::start(
            manager,
            tracker.clone(),
            metrics.clone(),
            &config.worker,
        ));

        Ok(Self {
            config,
            mode,
            database,
            registry,
            pool,
            tracker,
            metrics,
        })
    }

    /// 运行到收到关闭信号为止
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let prometheus = if self.config.observability.metrics_enabled {
            let handle = install_prometheus_recorder().context("安装Prometheus指标导出器失败")?;
            handles.push(spawn_metrics_upkeep(handle.clone(), METRICS_UPKEEP_INTERVAL));
            Some(handle)
        } else {
            None
        };

        let scheduler_handle = if self.mode.runs_scheduler() && self.config.scheduler.enabled {
            let (scheduler, handle) = ParserScheduler::new(
                self.database.parser_config_repository(),
                self.pool.clone(),
                self.config.scheduler.clone(),
                self.metrics.clone(),
            );
            handles.push(tokio::spawn(scheduler.run(shutdown_rx.resubscribe())));
            handle
        } else {
            info!("本进程不运行调度器");
            SchedulerHandle::detached()
        };

        if self.mode.runs_scheduler() && self.config.health.enabled {
            let monitor = HealthMonitor::new(
                self.database.parser_config_repository(),
                Arc::new(LogAlertSink::new(self.metrics.clone())),
                self.config.health.clone(),
            );
            handles.push(tokio::spawn(monitor.run(shutdown_rx.resubscribe())));
        }

        let served = if self.mode.runs_api() && self.config.api.enabled {
            let state = AppState {
                parser_configs: self.database.parser_config_repository(),
                run_logs: self.database.run_log_repository(),
                registry: Arc::clone(&self.registry),
                executor: self.pool.clone(),
                task_status: Arc::new(self.tracker.clone()),
                scheduler: scheduler_handle,
                database: self.database.clone(),
                metrics: prometheus,
            };
            self.serve_api(state, shutdown_rx.resubscribe()).await
        } else {
            let mut shutdown_rx = shutdown_rx;
            let _ = shutdown_rx.recv().await;
            Ok(())
        };

        // API启动失败时同样需要停止后台组件
        info!("等待后台组件停止...");
        for handle in handles {
            handle.abort_handle().abort();
        }

        self.pool.shutdown(POOL_DRAIN_TIMEOUT).await;
        self.database.close().await;

        served
    }

    async fn serve_api(&self, state: AppState, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let app = create_app(state, self.config.api.cors_enabled);
        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定API地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在: {}", self.config.api.bind_address);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await;

        if let Err(e) = result {
            error!("API服务器运行失败: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}
