use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fantasy_core::{
    config::WorkerConfig,
    models::{ParserConfig, RunStatus, TaskHandle, TaskState},
    traits::TaskExecutor,
    FantasyError, FantasyResult,
};
use fantasy_infrastructure::MetricsCollector;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::{TaskExecutionManager, TaskTracker};

#[derive(Debug)]
struct Job {
    handle: TaskHandle,
    config: ParserConfig,
}

/// worker 退出的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    /// 达到任务数上限，需要重建
    Recycled,
    /// 队列已关闭
    Drained,
}

type JobQueue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

/// 固定并发的工作池
///
/// 定时触发和手动触发的运行都进入同一个队列。每个 worker 处理
/// `max_tasks_per_worker` 个任务后退出并由监督任务重建。
pub struct WorkerPool {
    sender: RwLock<Option<mpsc::UnboundedSender<Job>>>,
    tracker: TaskTracker,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn start(
        manager: Arc<TaskExecutionManager>,
        tracker: TaskTracker,
        metrics: MetricsCollector,
        config: &WorkerConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: JobQueue = Arc::new(Mutex::new(receiver));

        let supervisor = tokio::spawn(supervise(
            queue,
            manager,
            tracker.clone(),
            metrics,
            config.concurrency,
            config.max_tasks_per_worker,
        ));

        info!(
            "工作池已启动: 并发={}, 单worker任务上限={}",
            config.concurrency, config.max_tasks_per_worker
        );

        Self {
            sender: RwLock::new(Some(sender)),
            tracker,
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// 停止接收新任务，等待队列中的任务执行完毕
    ///
    /// 超过 `timeout` 仍未完成时中止剩余的 worker。
    pub async fn shutdown(&self, timeout: Duration) {
        self.sender.write().await.take();

        let Some(mut supervisor) = self.supervisor.lock().await.take() else {
            return;
        };

        info!("等待工作池中的任务完成...");
        match tokio::time::timeout(timeout, &mut supervisor).await {
            Ok(_) => info!("工作池已停止"),
            Err(_) => {
                warn!("工作池在 {:?} 内未能停止，强制中止", timeout);
                supervisor.abort();
            }
        }
    }
}

#[async_trait]
impl TaskExecutor for WorkerPool {
    async fn execute(&self, config: ParserConfig) -> FantasyResult<TaskHandle> {
        let handle = TaskHandle::generate();
        self.tracker.register(&handle).await;

        let sender = self.sender.read().await;
        let Some(sender) = sender.as_ref() else {
            self.tracker.forget(&handle).await;
            return Err(FantasyError::Internal("工作池已关闭".to_string()));
        };

        debug!("任务入队: task={}, parser={}", handle, config.id);
        if sender
            .send(Job {
                handle: handle.clone(),
                config,
            })
            .is_err()
        {
            self.tracker.forget(&handle).await;
            return Err(FantasyError::Internal("工作池已关闭".to_string()));
        }

        Ok(handle)
    }
}

async fn supervise(
    queue: JobQueue,
    manager: Arc<TaskExecutionManager>,
    tracker: TaskTracker,
    metrics: MetricsCollector,
    concurrency: usize,
    max_tasks: u32,
) {
    let mut workers = JoinSet::new();
    let spawn_worker = |workers: &mut JoinSet<(usize, WorkerExit)>, worker_id: usize| {
        workers.spawn(worker_loop(
            worker_id,
            Arc::clone(&queue),
            Arc::clone(&manager),
            tracker.clone(),
            metrics.clone(),
            max_tasks,
        ));
    };

    for worker_id in 0..concurrency {
        spawn_worker(&mut workers, worker_id);
    }
    let mut next_id = concurrency;

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((worker_id, WorkerExit::Recycled)) => {
                debug!("worker {} 达到任务上限，重建", worker_id);
                spawn_worker(&mut workers, worker_id);
            }
            Ok((worker_id, WorkerExit::Drained)) => {
                debug!("worker {} 退出: 队列已关闭", worker_id);
            }
            Err(e) => {
                // 管道中的 panic 在 TaskExecutionManager 内已被捕获，这里只会是 worker 自身的问题
                error!("worker 异常退出: {}, 重建为 worker {}", e, next_id);
                spawn_worker(&mut workers, next_id);
                next_id += 1;
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: JobQueue,
    manager: Arc<TaskExecutionManager>,
    tracker: TaskTracker,
    metrics: MetricsCollector,
    max_tasks: u32,
) -> (usize, WorkerExit) {
    for _ in 0..max_tasks {
        let job = { queue.lock().await.recv().await };
        let Some(job) = job else {
            return (worker_id, WorkerExit::Drained);
        };

        tracker.mark_running(&job.handle).await;
        metrics.update_inflight_tasks(tracker.inflight().await);
        debug!("worker {} 开始执行任务 {}", worker_id, job.handle);

        let (status, outcome) = manager.run(job.config).await;
        let state = match status {
            RunStatus::Success => TaskState::Success,
            _ => TaskState::Failed,
        };
        tracker.complete(&job.handle, state, outcome).await;
        metrics.update_inflight_tasks(tracker.inflight().await);
    }

    (worker_id, WorkerExit::Recycled)
}
