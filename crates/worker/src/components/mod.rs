pub mod task_execution;
pub mod task_tracker;
pub mod worker_pool;

pub use task_execution::TaskExecutionManager;
pub use task_tracker::TaskTracker;
pub use worker_pool::WorkerPool;
