use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fantasy_core::{
    config::WorkerConfig,
    models::{ParserConfig, RunOutcome, RunStatus, TaskOutcome},
    traits::RunLogRepository,
    FantasyError, FantasyResult, JournalLevel, ParserRegistry, RunContext, RunJournal,
};
use fantasy_infrastructure::MetricsCollector;
use tracing::{error, info, warn};

/// 运行日志中最多逐条列出的映射错误
const MAX_LOGGED_MAPPING_ERRORS: usize = 20;

/// 管道执行成功时的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PipelineStats {
    total: usize,
    records_processed: i64,
    errors_count: i64,
}

impl PipelineStats {
    /// 批次非空但没有任何记录写入成功
    fn all_failed(&self) -> bool {
        self.total > 0 && self.records_processed == 0 && self.errors_count > 0
    }
}

/// 单次解析运行的完整流程
///
/// 创建运行日志 → 解析适配器 → fetch → transform → persist → 原子写入终态。
/// 管道在独立的任务中运行，超时后被中止，panic 被捕获为失败。
pub struct TaskExecutionManager {
    registry: Arc<ParserRegistry>,
    run_logs: Arc<dyn RunLogRepository>,
    metrics: MetricsCollector,
    task_timeout: Duration,
    log_data_max_bytes: usize,
}

impl TaskExecutionManager {
    pub fn new(
        registry: Arc<ParserRegistry>,
        run_logs: Arc<dyn RunLogRepository>,
        metrics: MetricsCollector,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            registry,
            run_logs,
            metrics,
            task_timeout: config.task_timeout(),
            log_data_max_bytes: config.log_data_max_bytes,
        }
    }

    /// 执行一次运行，不返回错误：所有失败都体现在运行日志和结果中
    pub async fn run(&self, config: ParserConfig) -> (RunStatus, TaskOutcome) {
        let started = Instant::now();
        let parser_type = config.parser_type.clone();

        let run_log = match self.run_logs.start_run(config.id, Utc::now()).await {
            Ok(run_log) => run_log,
            Err(e) => {
                error!("解析器 {} 创建运行日志失败: {}", config.id, e);
                self.metrics
                    .record_run(&parser_type, RunStatus::Failed.as_str(), started.elapsed(), 0);
                let outcome = TaskOutcome {
                    parser_id: config.id,
                    parser_name: config.name.clone(),
                    run_log_id: None,
                    records_processed: 0,
                    errors_count: 1,
                    execution_time_seconds: started.elapsed().as_secs_f64(),
                    error: Some(e.to_string()),
                };
                return (RunStatus::Failed, outcome);
            }
        };

        info!(
            "开始运行解析器: id={}, name={}, type={}, run_log={}",
            config.id, config.name, parser_type, run_log.id
        );

        let journal = RunJournal::new(self.log_data_max_bytes);
        journal.info(format!("开始运行解析器: {} ({})", config.name, parser_type));
        let ctx = RunContext::new(run_log.id, config.clone(), journal.clone());

        let result = self.run_pipeline_with_timeout(ctx).await;

        let (status, records_processed, errors_count, error_message) = match result {
            Ok(stats) if stats.all_failed() => {
                journal.conclude(
                    JournalLevel::Error,
                    &format!("全部 {} 条记录处理失败", stats.total),
                );
                (
                    RunStatus::Failed,
                    stats.records_processed,
                    stats.errors_count,
                    Some(format!("全部 {} 条记录处理失败", stats.total)),
                )
            }
            Ok(stats) => {
                journal.conclude(
                    JournalLevel::Info,
                    &format!(
                        "运行完成: 成功 {} 条, 失败 {} 条",
                        stats.records_processed, stats.errors_count
                    ),
                );
                (RunStatus::Success, stats.records_processed, stats.errors_count, None)
            }
            Err(e) => {
                journal.conclude(JournalLevel::Error, &format!("运行失败: {e}"));
                if e.is_transient() {
                    journal.conclude(JournalLevel::Warning, "临时性错误，将在下一次调度时重试");
                }
                warn!("解析器 {} 运行失败: {}", config.id, e);
                (RunStatus::Failed, 0, 1, Some(e.to_string()))
            }
        };

        let outcome = match status {
            RunStatus::Success => RunOutcome::success(records_processed, errors_count, journal.render()),
            _ => RunOutcome::failed(records_processed, errors_count, journal.render()),
        };

        let (status, error_message) = match self.run_logs.complete_run(run_log.id, config.id, &outcome).await {
            Ok(_) => (status, error_message),
            Err(e) => {
                error!("运行日志 {} 写入终态失败: {}", run_log.id, e);
                (RunStatus::Failed, Some(e.to_string()))
            }
        };

        let elapsed = started.elapsed();
        self.metrics
            .record_run(&parser_type, status.as_str(), elapsed, records_processed);
        info!(
            "解析器运行结束: id={}, status={}, 成功={}, 失败={}, 耗时={:.2}s",
            config.id,
            status,
            records_processed,
            errors_count,
            elapsed.as_secs_f64()
        );

        let outcome = TaskOutcome {
            parser_id: config.id,
            parser_name: config.name,
            run_log_id: Some(run_log.id),
            records_processed,
            errors_count,
            execution_time_seconds: elapsed.as_secs_f64(),
            error: error_message,
        };
        (status, outcome)
    }

    async fn run_pipeline_with_timeout(&self, ctx: RunContext) -> FantasyResult<PipelineStats> {
        let registry = Arc::clone(&self.registry);
        let mut handle = tokio::spawn(async move { run_pipeline(&registry, &ctx).await });

        match tokio::time::timeout(self.task_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) if join_error.is_panic() => {
                error!("解析器执行时发生panic: {}", join_error);
                Err(FantasyError::Internal(format!(
                    "解析器执行时发生panic: {join_error}"
                )))
            }
            Ok(Err(join_error)) => Err(FantasyError::Internal(format!(
                "解析器任务被取消: {join_error}"
            ))),
            Err(_) => {
                handle.abort();
                Err(FantasyError::TaskTimeout {
                    seconds: self.task_timeout.as_secs(),
                })
            }
        }
    }
}

async fn run_pipeline(registry: &ParserRegistry, ctx: &RunContext) -> FantasyResult<PipelineStats> {
    let adapter = registry.resolve(&ctx.config.parser_type)?;

    let raw = adapter.fetch(ctx).await?;
    let output = adapter.transform(raw)?;

    let total = output.total();
    let mapping_errors = output.errors.len() as i64;
    ctx.journal.info(format!(
        "数据转换完成: {} 条有效记录, {} 条映射失败",
        output.records.len(),
        mapping_errors
    ));
    for error in output.errors.iter().take(MAX_LOGGED_MAPPING_ERRORS) {
        ctx.journal.warn(error.to_string());
    }
    if output.errors.len() > MAX_LOGGED_MAPPING_ERRORS {
        ctx.journal.warn(format!(
            "另有 {} 条映射错误未列出",
            output.errors.len() - MAX_LOGGED_MAPPING_ERRORS
        ));
    }

    let stats = adapter.persist(ctx, output.records).await?;

    Ok(PipelineStats {
        total,
        records_processed: stats.records_processed,
        errors_count: stats.errors_count + mapping_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failed_requires_non_empty_batch() {
        assert!(!PipelineStats::default().all_failed());

        let stats = PipelineStats {
            total: 3,
            records_processed: 0,
            errors_count: 3,
        };
        assert!(stats.all_failed());

        let partial = PipelineStats {
            total: 3,
            records_processed: 1,
            errors_count: 2,
        };
        assert!(!partial.all_failed());
    }
}
