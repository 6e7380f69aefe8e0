//! # 解析器适配器接口
//!
//! 每个外部数据源实现一个 [`ParserAdapter`]，能力集合固定为
//! `fetch → transform → persist` 三段：
//!
//! - `fetch` 访问外部平台，失败时返回 `UpstreamUnavailable` 或 `UpstreamFormatError`
//! - `transform` 纯计算，无I/O；单条记录映射失败记入输出的错误列表并跳过
//! - `persist` 按平台ID幂等写入，重复运行不会产生重复行
//!
//! 适配器通过 [`crate::ParserRegistry`] 按 `parser_type` 查找，执行器不会对具体类型做分支判断。
//!
//! ## 实现示例
//!
//! ```rust,ignore
//! struct StaticAdapter;
//!
//! #[async_trait]
//! impl ParserAdapter for StaticAdapter {
//!     fn parser_type(&self) -> &str { "static" }
//!     fn platform(&self) -> Platform { Platform::Fpl }
//!
//!     async fn fetch(&self, _ctx: &RunContext) -> FantasyResult<RawPayload> {
//!         Ok(RawPayload::new("memory", serde_json::json!({ "elements": [] })))
//!     }
//!
//!     fn transform(&self, _raw: RawPayload) -> FantasyResult<TransformOutput> {
//!         Ok(TransformOutput::default())
//!     }
//!
//!     async fn persist(&self, _ctx: &RunContext, _records: Vec<NormalizedRecord>) -> FantasyResult<PersistStats> {
//!         Ok(PersistStats::default())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::models::{NormalizedRecord, ParserConfig, PersistStats, Platform, RawPayload, TransformOutput};
use crate::{FantasyResult, RunJournal};

/// 单次运行的上下文
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_log_id: i64,
    pub config: ParserConfig,
    pub journal: RunJournal,
}

impl RunContext {
    pub fn new(run_log_id: i64, config: ParserConfig, journal: RunJournal) -> Self {
        Self {
            run_log_id,
            config,
            journal,
        }
    }
}

#[async_trait]
pub trait ParserAdapter: Send + Sync {
    /// 注册表中的键
    fn parser_type(&self) -> &str;

    fn platform(&self) -> Platform;

    async fn fetch(&self, ctx: &RunContext) -> FantasyResult<RawPayload>;

    fn transform(&self, raw: RawPayload) -> FantasyResult<TransformOutput>;

    async fn persist(
        &self,
        ctx: &RunContext,
        records: Vec<NormalizedRecord>,
    ) -> FantasyResult<PersistStats>;
}
