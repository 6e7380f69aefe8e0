use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 任务句柄，派发一次运行时返回给调用方用于轮询状态
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 任务在执行器中的状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Failed,
}

impl TaskState {
    pub fn is_ready(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed)
    }
}

/// 任务终态时附带的运行结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutcome {
    pub parser_id: i64,
    pub parser_name: String,
    pub run_log_id: Option<i64>,
    pub records_processed: i64,
    pub errors_count: i64,
    pub execution_time_seconds: f64,
    pub error: Option<String>,
}

/// 状态轮询接口的返回体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatusReport {
    pub task_id: String,
    pub status: TaskState,
    pub ready: bool,
    pub successful: bool,
    pub failed: bool,
    pub result: Option<TaskOutcome>,
}

impl TaskStatusReport {
    pub fn new(handle: &TaskHandle, status: TaskState, result: Option<TaskOutcome>) -> Self {
        Self {
            task_id: handle.to_string(),
            status,
            ready: status.is_ready(),
            successful: status == TaskState::Success,
            failed: status == TaskState::Failed,
            result,
        }
    }
}

/// 手动触发运行的返回体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDispatch {
    pub task_id: String,
    pub status: String,
    pub parser_id: i64,
    pub parser_name: String,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_flags_follow_state() {
        let handle = TaskHandle::generate();

        let queued = TaskStatusReport::new(&handle, TaskState::Queued, None);
        assert!(!queued.ready && !queued.successful && !queued.failed);

        let running = TaskStatusReport::new(&handle, TaskState::Running, None);
        assert!(!running.ready);

        let success = TaskStatusReport::new(&handle, TaskState::Success, None);
        assert!(success.ready && success.successful && !success.failed);

        let failed = TaskStatusReport::new(&handle, TaskState::Failed, None);
        assert!(failed.ready && !failed.successful && failed.failed);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TaskState::Queued).unwrap(),
            serde_json::json!("queued")
        );
        let handle = TaskHandle::from("abc");
        assert_eq!(serde_json::to_value(&handle).unwrap(), serde_json::json!("abc"));
    }
}
