use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    NewParserConfig, OwnershipRecord, ParserConfig, Platform, PlayerProfile, PlayerRecord,
    PriceHistoryEntry, RunLog, RunOutcome, TeamRecord,
};
use crate::FantasyResult;

/// 解析器配置仓储
#[async_trait]
pub trait ParserConfigRepository: Send + Sync {
    async fn create(&self, config: &NewParserConfig) -> FantasyResult<ParserConfig>;

    async fn get_by_id(&self, id: i64) -> FantasyResult<Option<ParserConfig>>;

    async fn list(&self, skip: i64, limit: i64) -> FantasyResult<Vec<ParserConfig>>;

    /// 所有启用的配置，调度器全量同步和健康检查使用
    async fn list_active(&self) -> FantasyResult<Vec<ParserConfig>>;

    /// 保存可编辑字段，不会覆盖 last_run/last_status
    async fn update(&self, config: &ParserConfig) -> FantasyResult<ParserConfig>;

    async fn delete(&self, id: i64) -> FantasyResult<bool>;
}

/// 运行日志仓储
#[async_trait]
pub trait RunLogRepository: Send + Sync {
    /// 创建状态为 running 的运行日志
    async fn start_run(
        &self,
        parser_config_id: i64,
        started_at: DateTime<Utc>,
    ) -> FantasyResult<RunLog>;

    /// 在同一事务中写入运行终态并回写配置的 last_run/last_status
    ///
    /// 只有 running 状态的日志可以被结束；配置已被删除时只更新日志。
    async fn complete_run(
        &self,
        run_log_id: i64,
        parser_config_id: i64,
        outcome: &RunOutcome,
    ) -> FantasyResult<RunLog>;

    async fn get_by_id(&self, id: i64) -> FantasyResult<Option<RunLog>>;

    /// 按开始时间倒序
    async fn list_for_config(
        &self,
        parser_config_id: i64,
        skip: i64,
        limit: i64,
    ) -> FantasyResult<Vec<RunLog>>;

    /// 将进程异常退出遗留的 running 日志标记为失败，返回处理条数
    async fn fail_interrupted_runs(&self, message: &str) -> FantasyResult<u64>;
}

/// 球员相关记录的幂等写入
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// 按球队名称写入，返回球队ID
    async fn upsert_team(&self, team: &TeamRecord) -> FantasyResult<i64>;

    /// 写入球员、平台档案，价格或持有率变化时追加价格历史
    async fn upsert_player(&self, player: &PlayerRecord) -> FantasyResult<PlayerUpsert>;

    /// 更新已有平台档案的持有率，档案不存在时返回 false
    async fn update_ownership(&self, record: &OwnershipRecord) -> FantasyResult<bool>;

    async fn find_profile(
        &self,
        platform: Platform,
        platform_player_id: &str,
    ) -> FantasyResult<Option<PlayerProfile>>;

    async fn count_profiles(&self, platform: Platform) -> FantasyResult<i64>;

    async fn price_history(&self, profile_id: i64) -> FantasyResult<Vec<PriceHistoryEntry>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerUpsert {
    pub profile_id: i64,
    pub price_recorded: bool,
}
