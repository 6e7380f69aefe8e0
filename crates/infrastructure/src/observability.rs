use std::time::Duration;

use fantasy_core::{FantasyError, FantasyResult};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, info};

/// 解析器运行相关的指标
///
/// 指标通过全局 recorder 记录，未安装 recorder 时所有调用都是空操作。
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// 记录一次运行的终态
    pub fn record_run(&self, parser_type: &str, status: &str, duration: Duration, records: i64) {
        counter!(
            "fantasy_parser_runs_total",
            "parser_type" => parser_type.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!(
            "fantasy_parser_run_duration_seconds",
            "parser_type" => parser_type.to_string()
        )
        .record(duration.as_secs_f64());
        counter!(
            "fantasy_parser_records_total",
            "parser_type" => parser_type.to_string()
        )
        .increment(records.max(0) as u64);

        debug!(
            parser_type = parser_type,
            status = status,
            duration_seconds = duration.as_secs_f64(),
            records = records,
            "运行指标已记录"
        );
    }

    /// 调度器触发了一次运行
    pub fn record_dispatch(&self, parser_type: &str) {
        counter!(
            "fantasy_scheduler_dispatches_total",
            "parser_type" => parser_type.to_string()
        )
        .increment(1);
    }

    pub fn record_stale_alert(&self, parser_type: &str) {
        counter!(
            "fantasy_parser_stale_alerts_total",
            "parser_type" => parser_type.to_string()
        )
        .increment(1);
    }

    /// 当前已装载的调度触发器数量
    pub fn update_scheduled_triggers(&self, count: usize) {
        gauge!("fantasy_scheduler_triggers").set(count as f64);
    }

    /// 执行中和排队中的任务数
    pub fn update_inflight_tasks(&self, count: usize) {
        gauge!("fantasy_worker_inflight_tasks").set(count as f64);
    }
}

/// 安装全局 Prometheus recorder，返回用于渲染 /metrics 的句柄
pub fn install_prometheus_recorder() -> FantasyResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| FantasyError::Configuration(format!("安装Prometheus指标导出器失败: {e}")))?;
    info!("Prometheus 指标导出器已安装");
    Ok(handle)
}

/// 定期清理 histogram 的过期数据
pub fn spawn_metrics_upkeep(handle: PrometheusHandle, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            handle.run_upkeep();
        }
    })
}
