use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FantasyError, FantasyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            cors_enabled: true,
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        self.bind_address
            .parse::<SocketAddr>()
            .map_err(|e| FantasyError::Configuration(format!("无效的绑定地址 {}: {e}", self.bind_address)))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// pretty 或 json
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(FantasyError::Configuration(format!(
                "无效的日志级别: {}",
                self.log_level
            )));
        }
        if !["pretty", "json"].contains(&self.log_format.as_str()) {
            return Err(FantasyError::Configuration(format!(
                "不支持的日志格式: {}",
                self.log_format
            )));
        }
        Ok(())
    }
}

/// 外部平台访问配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub fpl_base_url: String,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            fpl_base_url: "https://fantasy.premierleague.com/api".to_string(),
            request_timeout_seconds: 30,
            user_agent: concat!("fantasy-parsers/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> FantasyResult<()> {
        if !self.fpl_base_url.starts_with("http://") && !self.fpl_base_url.starts_with("https://") {
            return Err(FantasyError::Configuration(format!(
                "FPL地址必须是http(s) URL: {}",
                self.fpl_base_url
            )));
        }
        if self.request_timeout_seconds == 0 {
            return Err(FantasyError::Configuration(
                "上游请求超时时间必须大于0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
