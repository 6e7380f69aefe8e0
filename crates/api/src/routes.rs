use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use fantasy_core::{
    traits::{ParserConfigRepository, RunLogRepository, TaskExecutor, TaskStatusService},
    ParserRegistry,
};
use fantasy_dispatcher::SchedulerHandle;
use fantasy_infrastructure::DatabaseManager;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::{
    health::health_check,
    metrics::render_metrics,
    parsers::{
        create_parser, delete_parser, get_parser, list_parser_types, list_parsers, parser_logs,
        run_parser, update_parser,
    },
    tasks::task_status,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub parser_configs: Arc<dyn ParserConfigRepository>,
    pub run_logs: Arc<dyn RunLogRepository>,
    pub registry: Arc<ParserRegistry>,
    pub executor: Arc<dyn TaskExecutor>,
    pub task_status: Arc<dyn TaskStatusService>,
    /// 配置变更后通知调度器增量更新触发表
    pub scheduler: SchedulerHandle,
    pub database: DatabaseManager,
    pub metrics: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .route("/parsers", get(list_parsers).post(create_parser))
        .route("/parsers/types", get(list_parser_types))
        .route(
            "/parsers/{id}",
            get(get_parser).put(update_parser).delete(delete_parser),
        )
        .route("/parsers/{id}/run", post(run_parser))
        .route("/parsers/{id}/logs", get(parser_logs))
        .route("/parsers/task/{task_id}/status", get(task_status))
        .with_state(state)
}
