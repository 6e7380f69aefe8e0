//! 解析任务的执行端：FPL 适配器、注册表构建、工作池和任务状态跟踪

pub mod adapters;
pub mod components;
pub mod executor_factory;

pub use adapters::{FplClient, FplOwnershipAdapter, FplPlayersAdapter};
pub use components::{TaskExecutionManager, TaskTracker, WorkerPool};
pub use executor_factory::build_parser_registry;
