//! 测试数据构建器

use chrono::{DateTime, Utc};
use fantasy_core::models::{LastStatus, NewParserConfig, ParserConfig, Platform};

/// 构建测试用的解析器配置
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            config: ParserConfig {
                id: 1,
                name: "FPL Players".to_string(),
                platform: Platform::Fpl,
                parser_type: "fpl_players".to_string(),
                schedule: Some("0 */4 * * *".to_string()),
                is_active: true,
                last_run: None,
                last_status: LastStatus::None,
                config: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.config.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    pub fn with_parser_type(mut self, parser_type: &str) -> Self {
        self.config.parser_type = parser_type.to_string();
        self
    }

    pub fn with_schedule(mut self, schedule: &str) -> Self {
        self.config.schedule = Some(schedule.to_string());
        self
    }

    pub fn without_schedule(mut self) -> Self {
        self.config.schedule = None;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.config.is_active = false;
        self
    }

    pub fn with_last_run(mut self, last_run: DateTime<Utc>, status: LastStatus) -> Self {
        self.config.last_run = Some(last_run);
        self.config.last_status = status;
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config.config = config;
        self
    }

    pub fn build(self) -> ParserConfig {
        self.config
    }

    /// 生成创建请求，id 和运行状态由存储分配
    pub fn build_new(self) -> NewParserConfig {
        NewParserConfig {
            name: self.config.name,
            platform: self.config.platform,
            parser_type: self.config.parser_type,
            schedule: self.config.schedule,
            is_active: self.config.is_active,
            config: self.config.config,
        }
    }
}

impl Default for ParserConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
