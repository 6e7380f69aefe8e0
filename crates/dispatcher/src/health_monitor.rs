use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use fantasy_core::{
    config::HealthConfig,
    models::{LastStatus, ParserConfig},
    traits::ParserConfigRepository,
    FantasyResult,
};
use fantasy_infrastructure::MetricsCollector;

/// 长时间没有运行的解析器
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleParserAlert {
    pub parser_id: i64,
    pub parser_name: String,
    pub parser_type: String,
    /// 从未运行时为空，保留一位小数
    pub hours_since_last_run: Option<f64>,
    pub last_status: LastStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub checked: usize,
    pub alerts: Vec<StaleParserAlert>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// 告警输出
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &StaleParserAlert) -> FantasyResult<()>;
}

/// 默认告警输出：结构化日志加计数器
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink {
    metrics: MetricsCollector,
}

impl LogAlertSink {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &StaleParserAlert) -> FantasyResult<()> {
        warn!(
            parser_id = alert.parser_id,
            parser_name = %alert.parser_name,
            hours_since_last_run = ?alert.hours_since_last_run,
            last_status = %alert.last_status,
            "解析器长时间未运行"
        );
        self.metrics.record_stale_alert(&alert.parser_type);
        Ok(())
    }
}

/// 定期检查启用的解析器是否按时运行，只读不写
pub struct HealthMonitor {
    config_repo: Arc<dyn ParserConfigRepository>,
    sink: Arc<dyn AlertSink>,
    settings: HealthConfig,
}

impl HealthMonitor {
    pub fn new(
        config_repo: Arc<dyn ParserConfigRepository>,
        sink: Arc<dyn AlertSink>,
        settings: HealthConfig,
    ) -> Self {
        Self {
            config_repo,
            sink,
            settings,
        }
    }

    fn stale_alert(&self, config: &ParserConfig, now: DateTime<Utc>) -> Option<StaleParserAlert> {
        let threshold = Duration::hours(self.settings.staleness_threshold_hours);
        let hours_since_last_run = match config.last_run {
            Some(last_run) if now - last_run <= threshold => return None,
            Some(last_run) => {
                let hours = (now - last_run).num_seconds() as f64 / 3600.0;
                Some((hours * 10.0).round() / 10.0)
            }
            None => None,
        };

        Some(StaleParserAlert {
            parser_id: config.id,
            parser_name: config.name.clone(),
            parser_type: config.parser_type.clone(),
            hours_since_last_run,
            last_status: config.last_status,
        })
    }

    /// 执行一次检查
    pub async fn check_once(&self, now: DateTime<Utc>) -> FantasyResult<HealthReport> {
        let configs = self.config_repo.list_active().await?;
        let alerts: Vec<StaleParserAlert> = configs
            .iter()
            .filter_map(|config| self.stale_alert(config, now))
            .collect();

        for alert in &alerts {
            if let Err(e) = self.sink.send(alert).await {
                error!("发送解析器 {} 的告警失败: {}", alert.parser_id, e);
            }
        }

        if alerts.is_empty() {
            info!("健康检查完成: {} 个启用的解析器均正常", configs.len());
        } else {
            warn!(
                "健康检查完成: {} 个启用的解析器中有 {} 个超过 {} 小时未运行",
                configs.len(),
                alerts.len(),
                self.settings.staleness_threshold_hours
            );
        }

        Ok(HealthReport {
            checked_at: now,
            checked: configs.len(),
            alerts,
        })
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "启动解析器健康检查 (间隔 {:?}, 阈值 {} 小时)",
            self.settings.check_interval(),
            self.settings.staleness_threshold_hours
        );

        let mut interval = tokio::time::interval(self.settings.check_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.check_once(Utc::now()).await {
                        error!("解析器健康检查失败: {}", e);
                    }
                }
                _ = shutdown.recv() => {
                    info!("收到关闭信号，停止健康检查");
                    break;
                }
            }
        }
    }
}
