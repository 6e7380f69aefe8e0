use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FantasyError, FantasyResult};

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// 检查触发表的间隔
    pub tick_interval_seconds: u64,
    /// 从数据库全量同步配置的间隔
    pub sync_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_seconds: 1,
            sync_interval_seconds: 90,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        if self.tick_interval_seconds == 0 || self.tick_interval_seconds > 60 {
            return Err(FantasyError::Configuration(
                "调度检查间隔必须在1-60秒之间".to_string(),
            ));
        }
        if self.sync_interval_seconds == 0 {
            return Err(FantasyError::Configuration(
                "配置同步间隔必须大于0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }
}

/// 工作池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 并发执行的worker数量
    pub concurrency: usize,
    /// 每个worker处理多少个任务后被回收重建
    pub max_tasks_per_worker: u32,
    /// 单次运行的硬超时
    pub task_timeout_seconds: u64,
    /// 终态任务在状态查询中保留的时长
    pub result_ttl_seconds: u64,
    /// log_data 的最大字节数
    pub log_data_max_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_tasks_per_worker: 100,
            task_timeout_seconds: 300,
            result_ttl_seconds: 86_400,
            log_data_max_bytes: 16 * 1024,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        if self.concurrency == 0 || self.concurrency > 256 {
            return Err(FantasyError::Configuration(
                "worker并发数必须在1-256之间".to_string(),
            ));
        }
        if self.max_tasks_per_worker == 0 {
            return Err(FantasyError::Configuration(
                "worker回收阈值必须大于0".to_string(),
            ));
        }
        if self.task_timeout_seconds == 0 {
            return Err(FantasyError::Configuration(
                "任务超时时间必须大于0".to_string(),
            ));
        }
        if self.log_data_max_bytes < 256 {
            return Err(FantasyError::Configuration(
                "log_data 上限不能小于256字节".to_string(),
            ));
        }
        Ok(())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_seconds)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_seconds)
    }
}

/// 健康检查配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub check_interval_seconds: u64,
    pub staleness_threshold_hours: i64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_seconds: 3600,
            staleness_threshold_hours: 24,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        if self.check_interval_seconds == 0 {
            return Err(FantasyError::Configuration(
                "健康检查间隔必须大于0".to_string(),
            ));
        }
        if self.staleness_threshold_hours <= 0 {
            return Err(FantasyError::Configuration(
                "过期阈值必须大于0小时".to_string(),
            ));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }
}
