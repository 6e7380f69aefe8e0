//! # 数据模型
//!
//! 数据采集子系统的核心数据结构。
//!
//! ## 核心模型
//!
//! ### ParserConfig - 解析器配置
//! 一个数据采集作业的定义：平台、解析器类型、CRON调度、启用状态，
//! 以及执行器回写的最近运行时间和结果。
//!
//! ### RunLog - 运行日志
//! 每次执行尝试一条记录，创建时为 `running`，结束时一次性写入终态。
//!
//! ### TaskHandle / TaskStatusReport - 任务句柄与状态
//! 派发运行时返回的临时标识，只存在于执行器的内存跟踪表中。
//!
//! ### NormalizedRecord - 归一化记录
//! 适配器转换阶段的产物，持久化阶段按平台ID幂等写入。
//!
//! ## 状态流转
//!
//! ```text
//! 任务:   queued → running → success
//!                         ↘ failed
//! 运行日志: running → success | failed （只变更一次）
//! ```
//!
//! ## 数据库映射
//!
//! ### parser_configs 表
//! - `id` - 主键
//! - `parser_type` - 注册表中的键
//! - `schedule` - 5段CRON表达式
//! - `last_run` / `last_status` - 执行器回写
//!
//! ### parser_logs 表
//! - `parser_config_id` - 配置ID（无外键，不级联删除）
//! - `status` - running / success / failed
//! - `log_data` - 有界的诊断文本

pub mod parser_config;
pub mod records;
pub mod run_log;
pub mod task;

pub use parser_config::*;
pub use records::*;
pub use run_log::*;
pub use task::*;
