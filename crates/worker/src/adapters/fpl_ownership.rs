use std::sync::Arc;

use async_trait::async_trait;
use fantasy_core::{
    models::{NormalizedRecord, OwnershipRecord, PersistStats, Platform, RawPayload, TransformOutput},
    traits::{ParserAdapter, PlayerRepository},
    FantasyError, FantasyResult, RunContext,
};
use serde::Deserialize;
use tracing::info;

use super::fpl::{element_label, raw_is_unavailable, BootstrapPayload, FplClient};

#[derive(Debug, Deserialize)]
struct OwnershipElement {
    id: i64,
    #[serde(deserialize_with = "super::fpl::flexible_f64")]
    selected_by_percent: f64,
}

/// FPL 持有率更新
///
/// 只更新已有的球员档案，不创建新球员；档案不存在的记录被跳过，不计为错误。
pub struct FplOwnershipAdapter {
    client: FplClient,
    players: Arc<dyn PlayerRepository>,
}

impl FplOwnershipAdapter {
    pub const PARSER_TYPE: &'static str = "fpl_ownership";

    pub fn new(client: FplClient, players: Arc<dyn PlayerRepository>) -> Self {
        Self { client, players }
    }
}

#[async_trait]
impl ParserAdapter for FplOwnershipAdapter {
    fn parser_type(&self) -> &str {
        Self::PARSER_TYPE
    }

    fn platform(&self) -> Platform {
        Platform::Fpl
    }

    async fn fetch(&self, ctx: &RunContext) -> FantasyResult<RawPayload> {
        self.client.fetch_bootstrap(ctx).await
    }

    fn transform(&self, raw: RawPayload) -> FantasyResult<TransformOutput> {
        let payload = BootstrapPayload::from_value(&raw.body)?;
        let mut output = TransformOutput::default();

        for raw_element in payload.elements {
            if raw_is_unavailable(raw_element) {
                continue;
            }
            match OwnershipElement::deserialize(raw_element) {
                Ok(element) => output.push(NormalizedRecord::Ownership(OwnershipRecord {
                    platform: Platform::Fpl,
                    platform_player_id: element.id.to_string(),
                    ownership_percent: element.selected_by_percent,
                })),
                Err(e) => output.reject(FantasyError::mapping(element_label(raw_element), e.to_string())),
            }
        }

        Ok(output)
    }

    async fn persist(
        &self,
        ctx: &RunContext,
        records: Vec<NormalizedRecord>,
    ) -> FantasyResult<PersistStats> {
        let mut stats = PersistStats::default();
        let mut skipped = 0usize;

        for record in &records {
            let NormalizedRecord::Ownership(ownership) = record else {
                ctx.journal
                    .warn(format!("忽略不支持的记录类型: {}", record.label()));
                continue;
            };

            match self.players.update_ownership(ownership).await {
                Ok(true) => stats.record_ok(),
                Ok(false) => skipped += 1,
                Err(e) => {
                    ctx.journal.error(format!("更新 {} 失败: {e}", record.label()));
                    stats.record_error();
                }
            }
        }

        if skipped > 0 {
            ctx.journal
                .info(format!("{skipped} 名球员尚无档案，跳过持有率更新"));
        }
        ctx.journal.info(format!(
            "已更新 {} 名球员的持有率",
            stats.records_processed
        ));
        info!(
            "FPL持有率写入完成: 成功 {}, 跳过 {}, 失败 {}",
            stats.records_processed, skipped, stats.errors_count
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fantasy_core::config::UpstreamConfig;
    use fantasy_core::models::{PlayerRecord, Position, TeamRecord};
    use fantasy_core::RunJournal;
    use fantasy_infrastructure::DatabaseManager;
    use fantasy_testing_utils::ParserConfigBuilder;
    use serde_json::json;

    #[test]
    fn test_transform_reads_string_percentages() {
        let players: Arc<dyn PlayerRepository> = Arc::new(NoopPlayers);
        let adapter = FplOwnershipAdapter::new(
            FplClient::new(&UpstreamConfig::default()).unwrap(),
            players,
        );

        let output = adapter
            .transform(RawPayload::new(
                "test",
                json!({
                    "teams": [],
                    "elements": [
                        { "id": 1, "selected_by_percent": "45.1", "status": "a" },
                        { "id": 2, "selected_by_percent": 3.0 },
                        { "id": 3, "selected_by_percent": "1.0", "status": "u" },
                        { "selected_by_percent": "2.0" }
                    ]
                }),
            ))
            .unwrap();

        assert_eq!(output.records.len(), 2);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(
            output.records[0],
            NormalizedRecord::Ownership(OwnershipRecord {
                platform: Platform::Fpl,
                platform_player_id: "1".to_string(),
                ownership_percent: 45.1,
            })
        );
    }

    #[tokio::test]
    async fn test_persist_only_updates_known_profiles() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let players = db.player_repository();

        players
            .upsert_team(&TeamRecord {
                platform_team_id: 1,
                name: "Arsenal".to_string(),
                abbreviation: "ARS".to_string(),
                league: "Premier League".to_string(),
            })
            .await
            .unwrap();
        players
            .upsert_player(&PlayerRecord {
                platform: Platform::Fpl,
                platform_player_id: "7".to_string(),
                first_name: "Bukayo".to_string(),
                last_name: "Saka".to_string(),
                web_name: "Saka".to_string(),
                team_name: "Arsenal".to_string(),
                position: Position::Mid,
                status: "a".to_string(),
                current_cost: 9.5,
                ownership_percent: 30.0,
                form: 5.0,
                total_points: 100,
                event_points: 6,
            })
            .await
            .unwrap();

        let adapter = FplOwnershipAdapter::new(
            FplClient::new(&UpstreamConfig::default()).unwrap(),
            players.clone(),
        );
        let ctx = RunContext::new(1, ParserConfigBuilder::new().build(), RunJournal::new(4096));
        let records = vec![
            NormalizedRecord::Ownership(OwnershipRecord {
                platform: Platform::Fpl,
                platform_player_id: "7".to_string(),
                ownership_percent: 41.5,
            }),
            NormalizedRecord::Ownership(OwnershipRecord {
                platform: Platform::Fpl,
                platform_player_id: "999".to_string(),
                ownership_percent: 1.0,
            }),
        ];

        let stats = adapter.persist(&ctx, records).await.unwrap();
        assert_eq!(stats.records_processed, 1);
        assert_eq!(stats.errors_count, 0);

        let profile = players.find_profile(Platform::Fpl, "7").await.unwrap().unwrap();
        assert_eq!(profile.ownership_percent, Some(41.5));
        assert!(ctx.journal.render().unwrap().contains("1 名球员尚无档案"));
    }

    struct NoopPlayers;

    #[async_trait]
    impl PlayerRepository for NoopPlayers {
        async fn upsert_team(&self, _team: &TeamRecord) -> FantasyResult<i64> {
            Ok(1)
        }

        async fn upsert_player(
            &self,
            _player: &PlayerRecord,
        ) -> FantasyResult<fantasy_core::PlayerUpsert> {
            Err(FantasyError::Internal("not used".to_string()))
        }

        async fn update_ownership(&self, _record: &OwnershipRecord) -> FantasyResult<bool> {
            Ok(false)
        }

        async fn find_profile(
            &self,
            _platform: Platform,
            _platform_player_id: &str,
        ) -> FantasyResult<Option<fantasy_core::models::PlayerProfile>> {
            Ok(None)
        }

        async fn count_profiles(&self, _platform: Platform) -> FantasyResult<i64> {
            Ok(0)
        }

        async fn price_history(
            &self,
            _profile_id: i64,
        ) -> FantasyResult<Vec<fantasy_core::models::PriceHistoryEntry>> {
            Ok(Vec::new())
        }
    }
}
