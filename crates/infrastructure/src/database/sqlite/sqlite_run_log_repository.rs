use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fantasy_core::{
    models::{LastStatus, RunLog, RunOutcome, RunStatus},
    traits::RunLogRepository,
    FantasyError, FantasyResult,
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument, warn};

use super::decode_text;
use crate::error_handling::RepositoryOperation;
use crate::repo_context;

const ENTITY: &str = "运行日志";

const COLUMNS: &str =
    "id, parser_config_id, started_at, finished_at, status, records_processed, errors_count, log_data";

pub struct SqliteRunLogRepository {
    pool: SqlitePool,
}

impl SqliteRunLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_run_log(row: &SqliteRow) -> FantasyResult<RunLog> {
        let status: String = row.try_get("status")?;
        Ok(RunLog {
            id: row.try_get("id")?,
            parser_config_id: row.try_get("parser_config_id")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            status: decode_text::<RunStatus>(&status, "status")?,
            records_processed: row.try_get("records_processed")?,
            errors_count: row.try_get("errors_count")?,
            log_data: row.try_get("log_data")?,
        })
    }
}

#[async_trait]
impl RunLogRepository for SqliteRunLogRepository {
    #[instrument(skip(self))]
    async fn start_run(
        &self,
        parser_config_id: i64,
        started_at: DateTime<Utc>,
    ) -> FantasyResult<RunLog> {
        let sql = format!(
            "INSERT INTO parser_logs (parser_config_id, started_at, status, records_processed, errors_count) \
             VALUES (?, ?, 'running', 0, 0) RETURNING {COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(parser_config_id)
            .bind(started_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                repo_context!(RepositoryOperation::Create, ENTITY, id = parser_config_id)
                    .database_error(e)
            })?;

        let run_log = Self::row_to_run_log(&row)?;
        debug!(
            "创建运行日志: ID {} (配置 {})",
            run_log.id, run_log.parser_config_id
        );
        Ok(run_log)
    }

    #[instrument(skip(self, outcome), fields(status = %outcome.status))]
    async fn complete_run(
        &self,
        run_log_id: i64,
        parser_config_id: i64,
        outcome: &RunOutcome,
    ) -> FantasyResult<RunLog> {
        if !outcome.status.is_terminal() {
            return Err(FantasyError::InvalidRequest(format!(
                "运行日志 {run_log_id} 只能以终态结束"
            )));
        }

        let context = repo_context!(RepositoryOperation::Update, ENTITY, id = run_log_id);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| context.database_error(e))?;

        let sql = format!(
            "UPDATE parser_logs SET status = ?, finished_at = ?, records_processed = ?, \
             errors_count = ?, log_data = ? WHERE id = ? AND status = 'running' RETURNING {COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(outcome.status.as_str())
            .bind(outcome.finished_at)
            .bind(outcome.records_processed)
            .bind(outcome.errors_count)
            .bind(&outcome.log_data)
            .bind(run_log_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| context.database_error(e))?;

        let Some(row) = row else {
            let exists = sqlx::query("SELECT 1 FROM parser_logs WHERE id = ?")
                .bind(run_log_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| context.database_error(e))?
                .is_some();
            tx.rollback().await.map_err(|e| context.database_error(e))?;

            return Err(if exists {
                FantasyError::InvalidRequest(format!("运行日志 {run_log_id} 已经结束，不能重复写入"))
            } else {
                FantasyError::RunLogNotFound { id: run_log_id }
            });
        };
        let run_log = Self::row_to_run_log(&row)?;

        let last_status = LastStatus::from(outcome.status);
        let config_updated = sqlx::query(
            "UPDATE parser_configs SET last_run = ?, last_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(outcome.finished_at)
        .bind(last_status.as_str())
        .bind(Utc::now())
        .bind(parser_config_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            repo_context!(RepositoryOperation::Update, "解析器配置", id = parser_config_id)
                .database_error(e)
        })?;

        tx.commit().await.map_err(|e| context.database_error(e))?;

        if config_updated.rows_affected() == 0 {
            warn!(
                "运行日志 {} 对应的解析器配置 {} 已不存在，仅记录运行结果",
                run_log_id, parser_config_id
            );
        }
        debug!(
            "运行日志 {} 已结束: {} (处理 {} 条, 错误 {} 条)",
            run_log.id, run_log.status, run_log.records_processed, run_log.errors_count
        );
        Ok(run_log)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> FantasyResult<Option<RunLog>> {
        let sql = format!("SELECT {COLUMNS} FROM parser_logs WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| repo_context!(RepositoryOperation::Read, ENTITY, id = id).database_error(e))?;

        row.as_ref().map(Self::row_to_run_log).transpose()
    }

    #[instrument(skip(self))]
    async fn list_for_config(
        &self,
        parser_config_id: i64,
        skip: i64,
        limit: i64,
    ) -> FantasyResult<Vec<RunLog>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM parser_logs WHERE parser_config_id = ? \
             ORDER BY started_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(parser_config_id)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                repo_context!(RepositoryOperation::Query, ENTITY, id = parser_config_id)
                    .database_error(e)
            })?;

        rows.iter().map(Self::row_to_run_log).collect()
    }

    #[instrument(skip(self))]
    async fn fail_interrupted_runs(&self, message: &str) -> FantasyResult<u64> {
        let context = repo_context!(RepositoryOperation::Update, ENTITY, detail = "running");
        let now = Utc::now();
        let line = format!("[{}] [ERROR] {}", now.format("%Y-%m-%d %H:%M:%S"), message);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| context.database_error(e))?;

        let result = sqlx::query(
            "UPDATE parser_logs SET status = 'failed', finished_at = ?, \
             log_data = CASE WHEN log_data IS NULL OR log_data = '' THEN ? ELSE log_data || char(10) || ? END \
             WHERE status = 'running'",
        )
        .bind(now)
        .bind(&line)
        .bind(&line)
        .execute(&mut *tx)
        .await
        .map_err(|e| context.database_error(e))?;

        sqlx::query(
            "UPDATE parser_configs SET last_status = 'failed', updated_at = ? WHERE last_status = 'running'",
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            repo_context!(RepositoryOperation::Update, "解析器配置", detail = "running")
                .database_error(e)
        })?;

        tx.commit().await.map_err(|e| context.database_error(e))?;

        let affected = result.rows_affected();
        if affected > 0 {
            warn!("已将 {} 条中断的运行日志标记为失败", affected);
        }
        Ok(affected)
    }
}
