use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Platform;
use crate::FantasyError;

/// 球员场上位置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Gk,
    Def,
    Mid,
    Fwd,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Gk => "GK",
            Position::Def => "DEF",
            Position::Mid => "MID",
            Position::Fwd => "FWD",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GK" => Ok(Position::Gk),
            "DEF" => Ok(Position::Def),
            "MID" => Ok(Position::Mid),
            "FWD" => Ok(Position::Fwd),
            _ => Err(format!("Invalid position: {s}")),
        }
    }
}

/// 上游返回的原始数据
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub source: String,
    pub body: serde_json::Value,
}

impl RawPayload {
    pub fn new(source: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            source: source.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamRecord {
    /// 平台内的球队ID，仅用于关联本批次的球员
    pub platform_team_id: i64,
    pub name: String,
    pub abbreviation: String,
    pub league: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub platform: Platform,
    pub platform_player_id: String,
    pub first_name: String,
    pub last_name: String,
    pub web_name: String,
    pub team_name: String,
    pub position: Position,
    pub status: String,
    pub current_cost: f64,
    pub ownership_percent: f64,
    pub form: f64,
    pub total_points: i64,
    pub event_points: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipRecord {
    pub platform: Platform,
    pub platform_player_id: String,
    pub ownership_percent: f64,
}

/// 已持久化的球员平台档案
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerProfile {
    pub id: i64,
    pub player_id: i64,
    pub platform: Platform,
    pub platform_player_id: String,
    pub custom_name: String,
    pub team_id: Option<i64>,
    pub position: Option<Position>,
    pub current_cost: f64,
    pub ownership_percent: Option<f64>,
    pub is_active: bool,
    pub status: Option<String>,
    pub form: Option<f64>,
    pub total_points: Option<i64>,
    pub event_points: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub player_profile_id: i64,
    pub cost: f64,
    pub ownership_percent: Option<f64>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// 归一化后的记录，按平台无关的形式交给持久化阶段
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecord {
    Team(TeamRecord),
    Player(PlayerRecord),
    Ownership(OwnershipRecord),
}

impl NormalizedRecord {
    /// 用于日志的简短标识
    pub fn label(&self) -> String {
        match self {
            NormalizedRecord::Team(team) => format!("team '{}'", team.name),
            NormalizedRecord::Player(player) => format!(
                "player {} ({}:{})",
                player.web_name, player.platform, player.platform_player_id
            ),
            NormalizedRecord::Ownership(ownership) => format!(
                "ownership {}:{}",
                ownership.platform, ownership.platform_player_id
            ),
        }
    }
}

/// 转换阶段的输出：成功映射的记录按原顺序排列，失败的记录单独计数
#[derive(Debug, Default)]
pub struct TransformOutput {
    pub records: Vec<NormalizedRecord>,
    pub errors: Vec<FantasyError>,
}

impl TransformOutput {
    pub fn push(&mut self, record: NormalizedRecord) {
        self.records.push(record);
    }

    pub fn reject(&mut self, error: FantasyError) {
        self.errors.push(error);
    }

    /// 参与转换的记录总数（成功 + 失败）
    pub fn total(&self) -> usize {
        self.records.len() + self.errors.len()
    }
}

/// 持久化阶段的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub records_processed: i64,
    pub errors_count: i64,
}

impl PersistStats {
    pub fn record_ok(&mut self) {
        self.records_processed += 1;
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_output_totals() {
        let mut output = TransformOutput::default();
        output.push(NormalizedRecord::Ownership(OwnershipRecord {
            platform: Platform::Fpl,
            platform_player_id: "1".to_string(),
            ownership_percent: 12.5,
        }));
        output.reject(FantasyError::mapping("element 2", "missing id"));
        assert_eq!(output.total(), 2);
        assert_eq!(output.records.len(), 1);
    }

    #[test]
    fn test_position_strings() {
        assert_eq!(Position::Gk.as_str(), "GK");
        assert_eq!("FWD".parse::<Position>().unwrap(), Position::Fwd);
        assert!("ST".parse::<Position>().is_err());
    }
}
