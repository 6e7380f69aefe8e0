use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use fantasy_core::{
    config::SchedulerConfig,
    models::ParserConfig,
    traits::{ParserConfigRepository, TaskExecutor},
    FantasyResult,
};
use fantasy_infrastructure::MetricsCollector;

use crate::cron_utils::CronSchedule;

/// API 对配置的修改通过该命令增量同步给调度器
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    Upsert(ParserConfig),
    Remove(i64),
}

/// 调度器的命令入口，可在多处克隆使用
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    sender: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// 没有调度器运行时使用，所有通知都会被丢弃
    pub fn detached() -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self { sender }
    }

    pub fn upsert(&self, config: ParserConfig) {
        let id = config.id;
        if self.sender.send(SchedulerCommand::Upsert(config)).is_err() {
            debug!("调度器未运行，忽略配置 {} 的同步通知", id);
        }
    }

    pub fn remove(&self, id: i64) {
        if self.sender.send(SchedulerCommand::Remove(id)).is_err() {
            debug!("调度器未运行，忽略配置 {} 的移除通知", id);
        }
    }
}

#[derive(Debug, Clone)]
struct Trigger {
    config: ParserConfig,
    cron: CronSchedule,
    next_fire: DateTime<Utc>,
}

/// 基于CRON的解析器调度器
///
/// 维护配置ID到触发器的映射。每次 tick 触发所有到期的触发器，
/// 然后从当前时间重新计算下一次触发（错过的触发直接跳过）。
pub struct ParserScheduler {
    config_repo: Arc<dyn ParserConfigRepository>,
    executor: Arc<dyn TaskExecutor>,
    settings: SchedulerConfig,
    metrics: MetricsCollector,
    triggers: HashMap<i64, Trigger>,
    /// 每个配置最近一次触发的时间点，重新同步后也保留
    last_fired: HashMap<i64, DateTime<Utc>>,
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
}

impl ParserScheduler {
    pub fn new(
        config_repo: Arc<dyn ParserConfigRepository>,
        executor: Arc<dyn TaskExecutor>,
        settings: SchedulerConfig,
        metrics: MetricsCollector,
    ) -> (Self, SchedulerHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let scheduler = Self {
            config_repo,
            executor,
            settings,
            metrics,
            triggers: HashMap::new(),
            last_fired: HashMap::new(),
            commands,
        };
        (scheduler, SchedulerHandle { sender })
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_scheduled(&self, config_id: i64) -> bool {
        self.triggers.contains_key(&config_id)
    }

    pub fn next_fire_time(&self, config_id: i64) -> Option<DateTime<Utc>> {
        self.triggers.get(&config_id).map(|t| t.next_fire)
    }

    /// 按最新的配置装载、更新或移除触发器
    pub fn upsert_trigger(&mut self, config: ParserConfig, now: DateTime<Utc>) {
        let id = config.id;
        if !config.is_schedulable() {
            if self.triggers.remove(&id).is_some() {
                info!("解析器 {} (ID: {}) 已停用或无调度表达式，移除触发器", config.name, id);
            }
            return;
        }

        let expression = config.schedule.clone().unwrap_or_default();

        if let Some(existing) = self.triggers.get_mut(&id) {
            if existing.cron.expression() == expression.trim() {
                // 调度未变化，保留已装载的触发时间
                existing.config = config;
                return;
            }
        }

        let cron = match CronSchedule::parse(&expression) {
            Ok(cron) => cron,
            Err(e) => {
                warn!("解析器 {} (ID: {}) 的CRON表达式无效，不予调度: {}", config.name, id, e);
                self.triggers.remove(&id);
                return;
            }
        };

        let from = match self.last_fired.get(&id) {
            Some(last) if *last > now => *last,
            _ => now,
        };
        let Some(next_fire) = cron.next_after(from) else {
            warn!("解析器 {} (ID: {}) 的CRON表达式没有后续触发时间", config.name, id);
            self.triggers.remove(&id);
            return;
        };

        debug!(
            "装载触发器: {} (ID: {}) {} [{}], 下次触发 {}",
            config.name,
            id,
            expression,
            cron.frequency_description(now),
            next_fire.format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.triggers.insert(
            id,
            Trigger {
                config,
                cron,
                next_fire,
            },
        );
    }

    pub fn remove_trigger(&mut self, config_id: i64) {
        if self.triggers.remove(&config_id).is_some() {
            info!("移除解析器触发器: ID {}", config_id);
        }
    }

    pub fn apply(&mut self, command: SchedulerCommand, now: DateTime<Utc>) {
        match command {
            SchedulerCommand::Upsert(config) => self.upsert_trigger(config, now),
            SchedulerCommand::Remove(id) => self.remove_trigger(id),
        }
        self.metrics.update_scheduled_triggers(self.triggers.len());
    }

    /// 从数据库全量同步，返回同步后的触发器数量
    pub async fn sync_all(&mut self, now: DateTime<Utc>) -> FantasyResult<usize> {
        let configs = self.config_repo.list_active().await?;
        let active_ids: HashSet<i64> = configs.iter().map(|c| c.id).collect();

        self.triggers.retain(|id, _| active_ids.contains(id));
        self.last_fired.retain(|id, _| active_ids.contains(id));
        for config in configs {
            self.upsert_trigger(config, now);
        }

        self.metrics.update_scheduled_triggers(self.triggers.len());
        debug!("全量同步完成，当前触发器数量: {}", self.triggers.len());
        Ok(self.triggers.len())
    }

    /// 触发所有到期的触发器，返回触发的配置ID
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Vec<i64> {
        let mut due: Vec<i64> = self
            .triggers
            .iter()
            .filter(|(_, trigger)| trigger.next_fire <= now)
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();

        for id in &due {
            let Some(trigger) = self.triggers.get_mut(id) else {
                continue;
            };

            let fired_at = trigger.next_fire;
            let config = trigger.config.clone();
            match trigger.cron.next_after(now) {
                Some(next_fire) => trigger.next_fire = next_fire,
                None => {
                    self.triggers.remove(id);
                }
            }
            self.last_fired.insert(*id, fired_at);

            info!(
                "触发定时任务: {} (ID: {}, 计划时间 {})",
                config.name,
                config.id,
                fired_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            self.metrics.record_dispatch(&config.parser_type);
            match self.executor.execute(config.clone()).await {
                Ok(handle) => debug!("解析器 {} 已提交执行, 任务ID: {}", config.id, handle),
                Err(e) => error!("提交解析器 {} 执行失败: {}", config.id, e),
            }
        }

        due
    }

    /// 调度循环，直到收到关闭信号
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "启动解析器调度器 (检查间隔 {:?}, 全量同步间隔 {:?})",
            self.settings.tick_interval(),
            self.settings.sync_interval()
        );

        let mut tick_interval = tokio::time::interval(self.settings.tick_interval());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sync_interval = tokio::time::interval(self.settings.sync_interval());
        sync_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = sync_interval.tick() => {
                    if let Err(e) = self.sync_all(Utc::now()).await {
                        error!("调度器全量同步失败: {}", e);
                    }
                }
                _ = tick_interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                Some(command) = self.commands.recv() => {
                    self.apply(command, Utc::now());
                }
                _ = shutdown.recv() => {
                    info!("收到关闭信号，停止解析器调度器");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fantasy_core::models::{LastStatus, Platform, TaskHandle};
    use fantasy_core::models::NewParserConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct NoConfigs;

    #[async_trait]
    impl ParserConfigRepository for NoConfigs {
        async fn create(&self, _config: &NewParserConfig) -> FantasyResult<ParserConfig> {
            unreachable!()
        }
        async fn get_by_id(&self, _id: i64) -> FantasyResult<Option<ParserConfig>> {
            Ok(None)
        }
        async fn list(&self, _skip: i64, _limit: i64) -> FantasyResult<Vec<ParserConfig>> {
            Ok(vec![])
        }
        async fn list_active(&self) -> FantasyResult<Vec<ParserConfig>> {
            Ok(vec![])
        }
        async fn update(&self, config: &ParserConfig) -> FantasyResult<ParserConfig> {
            Ok(config.clone())
        }
        async fn delete(&self, _id: i64) -> FantasyResult<bool> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct CountingExecutor {
        fired: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl TaskExecutor for CountingExecutor {
        async fn execute(&self, config: ParserConfig) -> FantasyResult<TaskHandle> {
            self.fired.lock().unwrap().push(config.id);
            Ok(TaskHandle::generate())
        }
    }

    fn config(id: i64, schedule: &str) -> ParserConfig {
        let now = Utc::now();
        ParserConfig {
            id,
            name: format!("parser-{id}"),
            platform: Platform::Fpl,
            parser_type: "fpl_players".to_string(),
            schedule: Some(schedule.to_string()),
            is_active: true,
            last_run: None,
            last_status: LastStatus::None,
            config: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn scheduler() -> (ParserScheduler, Arc<CountingExecutor>) {
        let executor = Arc::new(CountingExecutor::default());
        let (scheduler, _handle) = ParserScheduler::new(
            Arc::new(NoConfigs),
            executor.clone(),
            SchedulerConfig::default(),
            MetricsCollector::new(),
        );
        (scheduler, executor)
    }

    #[tokio::test]
    async fn test_changed_schedule_never_refires_same_instant() {
        let (mut scheduler, executor) = scheduler();
        let t0 = Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap();

        scheduler.upsert_trigger(config(1, "* * * * *"), t0);
        let due_at = scheduler.next_fire_time(1).unwrap();
        assert_eq!(scheduler.tick(due_at).await, vec![1]);

        // 修改为同一分钟也匹配的表达式，不能在已触发的时间点再触发
        scheduler.upsert_trigger(config(1, "*/1 * * * *"), due_at - chrono::Duration::seconds(30));
        assert!(scheduler.next_fire_time(1).unwrap() > due_at);
        assert!(scheduler.tick(due_at).await.is_empty());
        assert_eq!(executor.fired.lock().unwrap().len(), 1);
    }
}
