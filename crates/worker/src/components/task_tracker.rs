use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fantasy_core::{
    models::{TaskHandle, TaskOutcome, TaskState, TaskStatusReport},
    traits::TaskStatusService,
    FantasyError, FantasyResult,
};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct TrackedTask {
    state: TaskState,
    result: Option<TaskOutcome>,
    finished_at: Option<Instant>,
}

/// 内存中的任务状态表
///
/// 终态任务保留 `ttl` 后被清理，之后查询返回 `TaskNotFound`。
#[derive(Debug, Clone)]
pub struct TaskTracker {
    tasks: Arc<RwLock<HashMap<TaskHandle, TrackedTask>>>,
    ttl: Duration,
}

impl TaskTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn register(&self, handle: &TaskHandle) {
        self.purge_expired().await;
        self.tasks.write().await.insert(
            handle.clone(),
            TrackedTask {
                state: TaskState::Queued,
                result: None,
                finished_at: None,
            },
        );
    }

    pub async fn mark_running(&self, handle: &TaskHandle) {
        if let Some(task) = self.tasks.write().await.get_mut(handle) {
            if !task.state.is_ready() {
                task.state = TaskState::Running;
            }
        }
    }

    /// 写入终态，已是终态的任务不再变化
    pub async fn complete(&self, handle: &TaskHandle, state: TaskState, result: TaskOutcome) {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(handle) else {
            return;
        };
        if task.state.is_ready() {
            return;
        }
        task.state = state;
        task.result = Some(result);
        task.finished_at = Some(Instant::now());
    }

    pub async fn forget(&self, handle: &TaskHandle) {
        self.tasks.write().await.remove(handle);
    }

    /// 尚未进入终态的任务数
    pub async fn inflight(&self) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| !t.state.is_ready())
            .count()
    }

    pub async fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| match task.finished_at {
            Some(finished) => finished.elapsed() < ttl,
            None => true,
        });
        let purged = before - tasks.len();
        if purged > 0 {
            debug!("清理过期任务状态 {} 条", purged);
        }
        purged
    }
}

#[async_trait]
impl TaskStatusService for TaskTracker {
    async fn status(&self, handle: &TaskHandle) -> FantasyResult<TaskStatusReport> {
        self.purge_expired().await;
        let tasks = self.tasks.read().await;
        let task = tasks.get(handle).ok_or_else(|| FantasyError::TaskNotFound {
            task_id: handle.to_string(),
        })?;
        Ok(TaskStatusReport::new(handle, task.state, task.result.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> TaskOutcome {
        TaskOutcome {
            parser_id: 1,
            parser_name: "FPL Players".to_string(),
            run_log_id: Some(10),
            records_processed: 5,
            errors_count: 0,
            execution_time_seconds: 0.5,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_state_progression() {
        let tracker = TaskTracker::new(Duration::from_secs(60));
        let handle = TaskHandle::generate();

        tracker.register(&handle).await;
        assert_eq!(tracker.status(&handle).await.unwrap().status, TaskState::Queued);

        tracker.mark_running(&handle).await;
        assert_eq!(tracker.inflight().await, 1);

        tracker.complete(&handle, TaskState::Success, outcome()).await;
        let report = tracker.status(&handle).await.unwrap();
        assert!(report.ready && report.successful);
        assert_eq!(report.result.unwrap().records_processed, 5);

        // 终态之后不再变化
        tracker.mark_running(&handle).await;
        tracker.complete(&handle, TaskState::Failed, outcome()).await;
        assert_eq!(tracker.status(&handle).await.unwrap().status, TaskState::Success);
        assert_eq!(tracker.inflight().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let tracker = TaskTracker::new(Duration::from_secs(60));
        let result = tracker.status(&TaskHandle::from("missing")).await;
        assert!(matches!(result, Err(FantasyError::TaskNotFound { .. })));
    }

    #[tokio::test]
    async fn test_finished_tasks_expire() {
        let tracker = TaskTracker::new(Duration::from_millis(30));
        let finished = TaskHandle::generate();
        let pending = TaskHandle::generate();

        tracker.register(&finished).await;
        tracker.register(&pending).await;
        tracker.complete(&finished, TaskState::Failed, outcome()).await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(tracker.status(&finished).await.is_err());
        assert!(tracker.status(&pending).await.is_ok());
    }
}
