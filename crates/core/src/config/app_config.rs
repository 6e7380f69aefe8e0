use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig, UpstreamConfig},
    database::DatabaseConfig,
    scheduler_worker::{HealthConfig, SchedulerConfig, WorkerConfig},
};
use crate::FantasyResult;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/fantasy-parsers.toml";

/// 应用配置
///
/// 加载顺序：内置默认值 → TOML配置文件 → `FANTASY__` 前缀的环境变量，
/// 例如 `FANTASY__WORKER__CONCURRENCY=8`。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub worker: WorkerConfig,
    pub health: HealthConfig,
    pub api: ApiConfig,
    pub upstream: UpstreamConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置
    ///
    /// 显式指定的文件不存在时报错；未指定时依次尝试默认路径，都不存在则使用默认值。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [DEFAULT_CONFIG_PATH, "fantasy-parsers.toml"];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("FANTASY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate().context("配置校验失败")?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate().context("配置校验失败")?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> FantasyResult<()> {
        self.database.validate()?;
        self.scheduler.validate()?;
        self.worker.validate()?;
        self.health.validate()?;
        self.api.validate()?;
        self.upstream.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
