//! FPL 官方接口的客户端和数据结构
//!
//! 两个 FPL 适配器都读取 `bootstrap-static` 接口，返回体包含 `elements`（球员）和 `teams`（球队）。

use std::collections::HashMap;

use fantasy_core::{
    config::UpstreamConfig,
    models::{Position, RawPayload},
    FantasyError, FantasyResult, RunContext,
};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

pub const BOOTSTRAP_PATH: &str = "bootstrap-static/";
pub const FPL_LEAGUE: &str = "Premier League";

/// FPL 接口客户端
#[derive(Debug, Clone)]
pub struct FplClient {
    http: reqwest::Client,
    base_url: String,
}

impl FplClient {
    pub fn new(config: &UpstreamConfig) -> FantasyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FantasyError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            http,
            base_url: config.fpl_base_url.clone(),
        })
    }

    /// 配置中的 `base_url` 优先于全局地址
    pub fn bootstrap_url(&self, ctx: &RunContext) -> String {
        let base = ctx.config.config_str("base_url").unwrap_or(&self.base_url);
        format!("{}/{}", base.trim_end_matches('/'), BOOTSTRAP_PATH)
    }

    pub async fn fetch_bootstrap(&self, ctx: &RunContext) -> FantasyResult<RawPayload> {
        let url = self.bootstrap_url(ctx);
        ctx.journal.info(format!("从FPL接口获取数据: {url}"));
        debug!("请求FPL接口: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FantasyError::UpstreamUnavailable(format!("请求 {url} 失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!("FPL接口返回异常状态码: {} ({})", status, url);
            return Err(FantasyError::UpstreamUnavailable(format!(
                "接口返回状态码 {}",
                status.as_u16()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FantasyError::UpstreamFormatError(format!("响应不是有效的JSON: {e}")))?;

        let payload = BootstrapPayload::from_value(&body)?;
        ctx.journal.info(format!(
            "收到 {} 名球员, {} 支球队",
            payload.elements.len(),
            payload.teams.len()
        ));

        Ok(RawPayload::new(url, body))
    }
}

/// `bootstrap-static` 返回体的顶层结构，单条记录保持原始 JSON 以便逐条映射
#[derive(Debug)]
pub struct BootstrapPayload<'a> {
    pub elements: &'a [serde_json::Value],
    pub teams: &'a [serde_json::Value],
}

impl<'a> BootstrapPayload<'a> {
    pub fn from_value(body: &'a serde_json::Value) -> FantasyResult<Self> {
        let array = |key: &str| {
            body.get(key)
                .and_then(|v| v.as_array())
                .map(|v| v.as_slice())
                .ok_or_else(|| FantasyError::UpstreamFormatError(format!("返回体缺少 {key} 数组")))
        };

        Ok(Self {
            elements: array("elements")?,
            teams: array("teams")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FplTeam {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FplElement {
    pub id: i64,
    pub first_name: String,
    pub second_name: String,
    pub web_name: String,
    pub element_type: i64,
    pub team: i64,
    #[serde(default = "default_status")]
    pub status: String,
    pub now_cost: f64,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub selected_by_percent: f64,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub form: f64,
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub event_points: i64,
}

impl FplElement {
    /// 状态为 "u" 的球员已不可用，直接过滤
    pub fn is_unavailable(&self) -> bool {
        self.status == "u"
    }

    pub fn position(&self) -> Option<Position> {
        match self.element_type {
            1 => Some(Position::Gk),
            2 => Some(Position::Def),
            3 => Some(Position::Mid),
            4 => Some(Position::Fwd),
            _ => None,
        }
    }

    /// 接口价格以0.1为单位
    pub fn price(&self) -> f64 {
        self.now_cost / 10.0
    }
}

/// 用于错误信息的记录描述
pub fn element_label(raw: &serde_json::Value) -> String {
    let name = raw.get("web_name").and_then(|v| v.as_str()).unwrap_or("Unknown");
    match raw.get("id").and_then(|v| v.as_i64()) {
        Some(id) => format!("element {id} ({name})"),
        None => format!("element ({name})"),
    }
}

/// 原始数据中状态为 "u" 的球员，解析前即可判断
pub fn raw_is_unavailable(raw: &serde_json::Value) -> bool {
    raw.get("status").and_then(|v| v.as_str()) == Some("u")
}

/// 解析球队列表，返回 FPL 球队ID到球队的映射和无法解析的条目
pub fn parse_teams(teams: &[serde_json::Value]) -> (HashMap<i64, FplTeam>, Vec<FantasyError>) {
    let mut parsed = HashMap::new();
    let mut errors = Vec::new();

    for raw in teams {
        match FplTeam::deserialize(raw) {
            Ok(team) => {
                parsed.insert(team.id, team);
            }
            Err(e) => errors.push(FantasyError::mapping(format!("team {raw}"), e.to_string())),
        }
    }

    (parsed, errors)
}

fn default_status() -> String {
    "a".to_string()
}

/// FPL 的持有率和状态分有时是字符串，有时是数字
pub(crate) fn flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Number(f64),
        Text(String),
        Null,
    }

    match Flexible::deserialize(deserializer)? {
        Flexible::Number(n) => Ok(n),
        Flexible::Text(s) if s.trim().is_empty() => Ok(0.0),
        Flexible::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("无法解析数值: {s}"))),
        Flexible::Null => Ok(0.0),
    }
}
