//! 测试替身：不依赖网络的解析器适配器、记录调用的执行器和内存配置仓储

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fantasy_core::{
    models::{
        LastStatus, NewParserConfig, NormalizedRecord, OwnershipRecord, ParserConfig,
        PersistStats, Platform, RawPayload, TaskHandle, TransformOutput,
    },
    traits::{ParserAdapter, ParserConfigRepository, RunContext, TaskExecutor},
    FantasyError, FantasyResult,
};

/// 适配器在 fetch 阶段的行为
#[derive(Debug, Clone)]
pub enum FetchBehavior {
    /// 正常返回
    Succeed,
    /// 返回 UpstreamUnavailable
    Unavailable(String),
    /// 等待指定时长后再返回
    Delay(Duration),
    /// 永不返回
    Hang,
    Panic,
}

/// 行为可控的解析器适配器
///
/// transform 输出 `valid` 条持有率记录和 `malformed` 条映射错误；
/// persist 中前 `persist_failures` 条记录写入失败。
#[derive(Debug, Clone)]
pub struct StubAdapter {
    parser_type: String,
    fetch: FetchBehavior,
    valid: usize,
    malformed: usize,
    persist_failures: usize,
    progress_lines: usize,
    calls: Arc<Mutex<usize>>,
}

impl StubAdapter {
    pub fn new(parser_type: &str) -> Self {
        Self {
            parser_type: parser_type.to_string(),
            fetch: FetchBehavior::Succeed,
            valid: 3,
            malformed: 0,
            persist_failures: 0,
            progress_lines: 0,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_fetch(mut self, fetch: FetchBehavior) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_records(mut self, valid: usize, malformed: usize) -> Self {
        self.valid = valid;
        self.malformed = malformed;
        self
    }

    pub fn with_persist_failures(mut self, count: usize) -> Self {
        self.persist_failures = count;
        self
    }

    /// fetch 开始时向运行日志写入的进度行数
    pub fn with_progress_lines(mut self, count: usize) -> Self {
        self.progress_lines = count;
        self
    }

    /// fetch 被调用的次数
    pub fn fetch_calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ParserAdapter for StubAdapter {
    fn parser_type(&self) -> &str {
        &self.parser_type
    }

    fn platform(&self) -> Platform {
        Platform::Fpl
    }

    async fn fetch(&self, ctx: &RunContext) -> FantasyResult<RawPayload> {
        *self.calls.lock().unwrap() += 1;
        ctx.journal.info("stub fetch");
        for i in 0..self.progress_lines {
            ctx.journal.info(format!("progress line {i}"));
        }

        match &self.fetch {
            FetchBehavior::Succeed => {}
            FetchBehavior::Unavailable(message) => {
                return Err(FantasyError::UpstreamUnavailable(message.clone()))
            }
            FetchBehavior::Delay(delay) => tokio::time::sleep(*delay).await,
            FetchBehavior::Hang => std::future::pending::<()>().await,
            FetchBehavior::Panic => panic!("stub adapter panicked"),
        }

        Ok(RawPayload::new(
            "stub",
            serde_json::json!({ "valid": self.valid, "malformed": self.malformed }),
        ))
    }

    fn transform(&self, _raw: RawPayload) -> FantasyResult<TransformOutput> {
        let mut output = TransformOutput::default();
        for i in 0..self.valid {
            output.push(NormalizedRecord::Ownership(OwnershipRecord {
                platform: Platform::Fpl,
                platform_player_id: i.to_string(),
                ownership_percent: 1.0,
            }));
        }
        for i in 0..self.malformed {
            output.reject(FantasyError::mapping(format!("element {i}"), "malformed"));
        }
        Ok(output)
    }

    async fn persist(
        &self,
        ctx: &RunContext,
        records: Vec<NormalizedRecord>,
    ) -> FantasyResult<PersistStats> {
        let mut stats = PersistStats::default();
        for (index, record) in records.iter().enumerate() {
            if index < self.persist_failures {
                ctx.journal.error(format!("写入 {} 失败", record.label()));
                stats.record_error();
            } else {
                stats.record_ok();
            }
        }
        Ok(stats)
    }
}

/// 记录所有提交的配置，不真正执行
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    submitted: Arc<Mutex<Vec<ParserConfig>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted_ids(&self) -> Vec<i64> {
        self.submitted.lock().unwrap().iter().map(|c| c.id).collect()
    }

    pub fn count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, config: ParserConfig) -> FantasyResult<TaskHandle> {
        self.submitted.lock().unwrap().push(config);
        Ok(TaskHandle::generate())
    }
}

/// 内存中的解析器配置仓储
#[derive(Debug, Clone, Default)]
pub struct MockParserConfigRepository {
    configs: Arc<Mutex<HashMap<i64, ParserConfig>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockParserConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(configs: Vec<ParserConfig>) -> Self {
        let max_id = configs.iter().map(|c| c.id).max().unwrap_or(0);
        let map = configs.into_iter().map(|c| (c.id, c)).collect();
        Self {
            configs: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id)),
        }
    }

    /// 直接替换一条配置，模拟绕过API的修改
    pub fn put(&self, config: ParserConfig) {
        self.configs.lock().unwrap().insert(config.id, config);
    }

    pub fn remove(&self, id: i64) {
        self.configs.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl ParserConfigRepository for MockParserConfigRepository {
    async fn create(&self, config: &NewParserConfig) -> FantasyResult<ParserConfig> {
        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            *next_id
        };
        let now = Utc::now();
        let created = ParserConfig {
            id,
            name: config.name.clone(),
            platform: config.platform,
            parser_type: config.parser_type.clone(),
            schedule: config.schedule.clone(),
            is_active: config.is_active,
            last_run: None,
            last_status: LastStatus::None,
            config: config.config.clone(),
            created_at: now,
            updated_at: now,
        };
        self.put(created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FantasyResult<Option<ParserConfig>> {
        Ok(self.configs.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, skip: i64, limit: i64) -> FantasyResult<Vec<ParserConfig>> {
        let mut configs: Vec<ParserConfig> = self.configs.lock().unwrap().values().cloned().collect();
        configs.sort_by_key(|c| c.id);
        Ok(configs
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_active(&self) -> FantasyResult<Vec<ParserConfig>> {
        let mut configs: Vec<ParserConfig> = self
            .configs
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        configs.sort_by_key(|c| c.id);
        Ok(configs)
    }

    async fn update(&self, config: &ParserConfig) -> FantasyResult<ParserConfig> {
        let mut configs = self.configs.lock().unwrap();
        let stored = configs
            .get_mut(&config.id)
            .ok_or(FantasyError::ParserConfigNotFound { id: config.id })?;
        let (last_run, last_status) = (stored.last_run, stored.last_status);
        *stored = config.clone();
        stored.last_run = last_run;
        stored.last_status = last_status;
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> FantasyResult<bool> {
        Ok(self.configs.lock().unwrap().remove(&id).is_some())
    }
}
