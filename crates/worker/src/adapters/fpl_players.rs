use std::sync::Arc;

use async_trait::async_trait;
use fantasy_core::{
    models::{
        NormalizedRecord, PersistStats, Platform, PlayerRecord, RawPayload, TeamRecord,
        TransformOutput,
    },
    traits::{ParserAdapter, PlayerRepository},
    FantasyError, FantasyResult, RunContext,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::fpl::{
    element_label, parse_teams, raw_is_unavailable, BootstrapPayload, FplClient, FplElement,
    FPL_LEAGUE,
};

/// 每处理多少名球员写一次进度
const PROGRESS_EVERY: i64 = 100;

/// FPL 球员和球队数据
pub struct FplPlayersAdapter {
    client: FplClient,
    players: Arc<dyn PlayerRepository>,
}

impl FplPlayersAdapter {
    pub const PARSER_TYPE: &'static str = "fpl_players";

    pub fn new(client: FplClient, players: Arc<dyn PlayerRepository>) -> Self {
        Self { client, players }
    }
}

#[async_trait]
impl ParserAdapter for FplPlayersAdapter {
    fn parser_type(&self) -> &str {
        Self::PARSER_TYPE
    }

    fn platform(&self) -> Platform {
        Platform::Fpl
    }

    async fn fetch(&self, ctx: &RunContext) -> FantasyResult<RawPayload> {
        self.client.fetch_bootstrap(ctx).await
    }

    /// 球队在前，球员在后，保证写入球员时球队已存在
    fn transform(&self, raw: RawPayload) -> FantasyResult<TransformOutput> {
        let payload = BootstrapPayload::from_value(&raw.body)?;
        let mut output = TransformOutput::default();

        let (teams, team_errors) = parse_teams(payload.teams);
        for error in team_errors {
            output.reject(error);
        }

        let mut team_ids: Vec<i64> = teams.keys().copied().collect();
        team_ids.sort_unstable();
        for id in &team_ids {
            let team = &teams[id];
            output.push(NormalizedRecord::Team(TeamRecord {
                platform_team_id: team.id,
                name: team.name.clone(),
                abbreviation: team.short_name.clone(),
                league: FPL_LEAGUE.to_string(),
            }));
        }

        for raw_element in payload.elements {
            if raw_is_unavailable(raw_element) {
                continue;
            }

            let element = match FplElement::deserialize(raw_element) {
                Ok(element) => element,
                Err(e) => {
                    output.reject(FantasyError::mapping(element_label(raw_element), e.to_string()));
                    continue;
                }
            };

            let Some(position) = element.position() else {
                output.reject(FantasyError::mapping(
                    element_label(raw_element),
                    format!("未知的位置类型 element_type={}", element.element_type),
                ));
                continue;
            };

            let Some(team) = teams.get(&element.team) else {
                output.reject(FantasyError::mapping(
                    element_label(raw_element),
                    format!("找不到球队 team={}", element.team),
                ));
                continue;
            };

            output.push(NormalizedRecord::Player(PlayerRecord {
                platform: Platform::Fpl,
                platform_player_id: element.id.to_string(),
                first_name: element.first_name.clone(),
                last_name: element.second_name.clone(),
                web_name: element.web_name.clone(),
                team_name: team.name.clone(),
                position,
                status: element.status.clone(),
                current_cost: element.price(),
                ownership_percent: element.selected_by_percent,
                form: element.form,
                total_points: element.total_points,
                event_points: element.event_points,
            }));
        }

        debug!(
            "FPL球员数据转换完成: {} 条记录, {} 条映射失败",
            output.records.len(),
            output.errors.len()
        );
        Ok(output)
    }

    async fn persist(
        &self,
        ctx: &RunContext,
        records: Vec<NormalizedRecord>,
    ) -> FantasyResult<PersistStats> {
        let mut stats = PersistStats::default();
        let mut players_done = 0i64;
        let mut price_changes = 0usize;

        for record in &records {
            let result = match record {
                NormalizedRecord::Team(team) => self.players.upsert_team(team).await.map(|_| ()),
                NormalizedRecord::Player(player) => {
                    self.players.upsert_player(player).await.map(|upsert| {
                        if upsert.price_recorded {
                            price_changes += 1;
                        }
                    })
                }
                NormalizedRecord::Ownership(_) => {
                    ctx.journal
                        .warn(format!("忽略不支持的记录类型: {}", record.label()));
                    continue;
                }
            };

            match result {
                Ok(()) => {
                    stats.record_ok();
                    if matches!(record, NormalizedRecord::Player(_)) {
                        players_done += 1;
                        if players_done % PROGRESS_EVERY == 0 {
                            ctx.journal.info(format!("已处理 {players_done} 名球员..."));
                        }
                    }
                }
                Err(e) => {
                    ctx.journal.error(format!("写入 {} 失败: {e}", record.label()));
                    stats.record_error();
                }
            }
        }

        ctx.journal.info(format!(
            "已更新 {players_done} 名球员, 新增 {price_changes} 条价格记录"
        ));
        info!(
            "FPL球员数据写入完成: 成功 {}, 失败 {}",
            stats.records_processed, stats.errors_count
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fantasy_core::config::UpstreamConfig;
    use fantasy_core::models::Position;
    use fantasy_infrastructure::DatabaseManager;
    use serde_json::json;

    fn adapter(players: Arc<dyn PlayerRepository>) -> FplPlayersAdapter {
        let client = FplClient::new(&UpstreamConfig::default()).unwrap();
        FplPlayersAdapter::new(client, players)
    }

    fn element(id: i64, element_type: i64, team: i64, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "code": 1000 + id,
            "first_name": format!("First{id}"),
            "second_name": format!("Last{id}"),
            "web_name": format!("Player{id}"),
            "element_type": element_type,
            "team": team,
            "status": status,
            "now_cost": 55,
            "selected_by_percent": "12.3",
            "form": "4.0",
            "total_points": 40,
            "event_points": 2
        })
    }

    fn payload(elements: Vec<serde_json::Value>) -> RawPayload {
        RawPayload::new(
            "test",
            json!({
                "teams": [
                    { "id": 1, "name": "Arsenal", "short_name": "ARS" },
                    { "id": 2, "name": "Chelsea", "short_name": "CHE" }
                ],
                "elements": elements
            }),
        )
    }

    async fn in_memory_adapter() -> FplPlayersAdapter {
        let db = DatabaseManager::in_memory().await.unwrap();
        adapter(db.player_repository())
    }

    #[tokio::test]
    async fn test_transform_orders_teams_before_players() {
        let adapter = in_memory_adapter().await;
        let output = adapter
            .transform(payload(vec![element(1, 1, 2, "a"), element(2, 4, 1, "d")]))
            .unwrap();

        assert!(output.errors.is_empty());
        assert_eq!(output.records.len(), 4);
        assert!(matches!(&output.records[0], NormalizedRecord::Team(t) if t.name == "Arsenal"));
        assert!(matches!(&output.records[1], NormalizedRecord::Team(t) if t.abbreviation == "CHE"));

        let NormalizedRecord::Player(gk) = &output.records[2] else {
            panic!("expected player record");
        };
        assert_eq!(gk.position, Position::Gk);
        assert_eq!(gk.team_name, "Chelsea");
        assert_eq!(gk.current_cost, 5.5);
        assert_eq!(gk.ownership_percent, 12.3);
        assert_eq!(gk.platform_player_id, "1");
    }

    #[tokio::test]
    async fn test_transform_partial_failure() {
        let adapter = in_memory_adapter().await;
        let mut broken = element(5, 3, 1, "a");
        broken.as_object_mut().unwrap().remove("web_name");

        let output = adapter
            .transform(payload(vec![
                element(1, 3, 1, "a"),
                element(2, 9, 1, "a"),
                element(3, 3, 99, "a"),
                element(4, 3, 1, "u"),
                broken,
            ]))
            .unwrap();

        // 2 支球队 + 1 名有效球员；不可用的球员被过滤且不计为错误
        assert_eq!(output.records.len(), 3);
        assert_eq!(output.errors.len(), 3);
        assert!(output
            .errors
            .iter()
            .all(|e| matches!(e, FantasyError::MappingError { .. })));
    }

    #[tokio::test]
    async fn test_transform_rejects_unexpected_shape() {
        let adapter = in_memory_adapter().await;
        let result = adapter.transform(RawPayload::new("test", json!({ "players": [] })));
        assert!(matches!(result, Err(FantasyError::UpstreamFormatError(_))));
    }
}
