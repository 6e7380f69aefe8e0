use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{FantasyError, FantasyResult};

/// 数据来源平台
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    Fpl,
    Fanteam,
    Sorare,
    Fanton,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Fpl => "FPL",
            Platform::Fanteam => "FANTEAM",
            Platform::Sorare => "SORARE",
            Platform::Fanton => "FANTON",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FPL" => Ok(Platform::Fpl),
            "FANTEAM" => Ok(Platform::Fanteam),
            "SORARE" => Ok(Platform::Sorare),
            "FANTON" => Ok(Platform::Fanton),
            _ => Err(format!("Invalid platform: {s}")),
        }
    }
}

/// 解析器最近一次运行的结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum LastStatus {
    Success,
    Failed,
    Running,
    #[default]
    None,
}

impl LastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LastStatus::Success => "success",
            LastStatus::Failed => "failed",
            LastStatus::Running => "running",
            LastStatus::None => "none",
        }
    }
}

impl fmt::Display for LastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LastStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LastStatus::Success),
            "failed" => Ok(LastStatus::Failed),
            "running" => Ok(LastStatus::Running),
            "none" => Ok(LastStatus::None),
            _ => Err(format!("Invalid last status: {s}")),
        }
    }
}

/// 解析器配置
///
/// 每条配置描述一个数据采集作业：使用哪个解析器类型、按什么CRON表达式调度、
/// 是否启用。`last_run`/`last_status` 只由任务执行器在运行结束后写入。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParserConfig {
    pub id: i64,
    pub name: String,
    pub platform: Platform,
    pub parser_type: String,
    /// 5段CRON表达式；为空表示仅支持手动运行
    pub schedule: Option<String>,
    pub is_active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: LastStatus,
    /// 解析器专属参数
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ParserConfig {
    /// 是否应该进入调度表
    pub fn is_schedulable(&self) -> bool {
        self.is_active
            && self
                .schedule
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
    }

    /// 读取解析器专属的字符串参数
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    pub fn apply_patch(&mut self, patch: ParserConfigPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(platform) = patch.platform {
            self.platform = platform;
        }
        if let Some(parser_type) = patch.parser_type {
            self.parser_type = parser_type;
        }
        if let Some(schedule) = patch.schedule {
            self.schedule = schedule;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(config) = patch.config {
            self.config = config;
        }
        self.updated_at = Utc::now();
    }
}

fn default_active() -> bool {
    true
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}

/// 创建解析器配置的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParserConfig {
    pub name: String,
    pub platform: Platform,
    pub parser_type: String,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
}

impl NewParserConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        validate_name(&self.name)?;
        validate_parser_type(&self.parser_type)?;
        validate_config_blob(&self.config)
    }
}

/// 部分更新请求，未出现的字段保持不变
///
/// `schedule` 显式传 `null` 时会清空调度表达式。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfigPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub parser_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub schedule: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl ParserConfigPatch {
    pub fn validate(&self) -> FantasyResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(parser_type) = &self.parser_type {
            validate_parser_type(parser_type)?;
        }
        if let Some(config) = &self.config {
            validate_config_blob(config)?;
        }
        Ok(())
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn validate_name(name: &str) -> FantasyResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FantasyError::InvalidRequest("解析器名称不能为空".to_string()));
    }
    if trimmed.chars().count() > 100 {
        return Err(FantasyError::InvalidRequest(
            "解析器名称长度不能超过100个字符".to_string(),
        ));
    }
    Ok(())
}

fn validate_parser_type(parser_type: &str) -> FantasyResult<()> {
    if parser_type.trim().is_empty() {
        return Err(FantasyError::InvalidRequest("解析器类型不能为空".to_string()));
    }
    Ok(())
}

fn validate_config_blob(config: &serde_json::Value) -> FantasyResult<()> {
    if !config.is_object() {
        return Err(FantasyError::InvalidRequest(
            "config 必须是JSON对象".to_string(),
        ));
    }
    Ok(())
}
