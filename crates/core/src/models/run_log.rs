use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LastStatus;

/// 单次运行的状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

impl From<RunStatus> for LastStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Running => LastStatus::Running,
            RunStatus::Success => LastStatus::Success,
            RunStatus::Failed => LastStatus::Failed,
        }
    }
}

/// 运行日志，每次执行尝试对应一条
///
/// 创建时状态为 `running` 且 `finished_at` 为空；结束时只更新一次，之后不可变。
/// `parser_config_id` 只是引用，配置被删除后历史日志依然保留。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunLog {
    pub id: i64,
    pub parser_config_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub records_processed: i64,
    pub errors_count: i64,
    pub log_data: Option<String>,
}

impl RunLog {
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// 运行耗时（毫秒），运行中返回 None
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

/// 运行结束时写入的终态
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub finished_at: DateTime<Utc>,
    pub records_processed: i64,
    pub errors_count: i64,
    pub log_data: Option<String>,
}

impl RunOutcome {
    pub fn success(records_processed: i64, errors_count: i64, log_data: Option<String>) -> Self {
        Self {
            status: RunStatus::Success,
            finished_at: Utc::now(),
            records_processed,
            errors_count,
            log_data,
        }
    }

    pub fn failed(records_processed: i64, errors_count: i64, log_data: Option<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            finished_at: Utc::now(),
            records_processed,
            errors_count,
            log_data,
        }
    }
}
