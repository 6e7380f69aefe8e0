use serde::{Deserialize, Serialize};

use crate::{FantasyError, FantasyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/fantasy_parsers.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            connection_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        if self.url.is_empty() {
            return Err(FantasyError::Configuration("数据库URL不能为空".to_string()));
        }

        if !self.url.starts_with("sqlite:") {
            return Err(FantasyError::Configuration(
                "数据库URL必须是SQLite格式 (sqlite:...)".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(FantasyError::Configuration(
                "最大连接数必须大于0".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(FantasyError::Configuration(
                "最小连接数不能大于最大连接数".to_string(),
            ));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(FantasyError::Configuration(
                "连接超时时间必须大于0".to_string(),
            ));
        }

        Ok(())
    }

    /// 是否为内存数据库
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_database_config_validation() {
        let mut config = DatabaseConfig::default();

        config.url = "postgresql://localhost/fantasy".to_string();
        assert!(config.validate().is_err());

        config.url = "sqlite::memory:".to_string();
        assert!(config.validate().is_ok());
        assert!(config.is_in_memory());

        config.min_connections = 10;
        assert!(config.validate().is_err());

        config.min_connections = 1;
        config.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
