use async_trait::async_trait;

use crate::models::{ParserConfig, TaskHandle, TaskStatusReport};
use crate::FantasyResult;

/// 任务执行器
///
/// `execute` 只负责登记并派发，立即返回任务句柄；运行在工作池中异步进行。
/// 调度器的定时触发和API的手动触发共用同一个执行器。
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, config: ParserConfig) -> FantasyResult<TaskHandle>;
}

/// 任务状态查询
///
/// 可以被反复廉价地轮询；一旦 `ready` 为 true，返回内容不再变化。
/// 未知或已过期的句柄返回 `TaskNotFound`。
#[async_trait]
pub trait TaskStatusService: Send + Sync {
    async fn status(&self, handle: &TaskHandle) -> FantasyResult<TaskStatusReport>;
}
