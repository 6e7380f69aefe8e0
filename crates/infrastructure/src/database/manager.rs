use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fantasy_core::{
    config::DatabaseConfig,
    traits::{ParserConfigRepository, PlayerRepository, RunLogRepository},
    FantasyError, FantasyResult,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::schema::bootstrap_schema;
use super::sqlite::{SqliteParserConfigRepository, SqlitePlayerRepository, SqliteRunLogRepository};

/// 数据库连接池和仓储的统一入口
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 按配置创建连接池，数据库文件不存在时自动创建
    pub async fn new(config: &DatabaseConfig) -> FantasyResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| FantasyError::Configuration(format!("数据库URL无效 {}: {e}", config.url)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.connection_timeout_seconds));

        if config.is_in_memory() {
            // 内存库每个连接都是独立的数据库，只能使用单连接
            return Self::connect(memory_pool_options(), options).await;
        }

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FantasyError::Configuration(format!(
                        "无法创建数据库目录 {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));
        Self::connect(pool_options, options.journal_mode(SqliteJournalMode::Wal)).await
    }

    /// 内存数据库，已完成建表，测试使用
    pub async fn in_memory() -> FantasyResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let manager = Self::connect(memory_pool_options(), options).await?;
        manager.run_migrations().await?;
        Ok(manager)
    }

    async fn connect(
        pool_options: SqlitePoolOptions,
        options: SqliteConnectOptions,
    ) -> FantasyResult<Self> {
        let pool = pool_options.connect_with(options).await?;
        debug!("数据库连接池已创建");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> FantasyResult<()> {
        bootstrap_schema(&self.pool).await
    }

    pub async fn health_check(&self) -> FantasyResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("数据库连接池已关闭");
    }

    pub fn parser_config_repository(&self) -> Arc<dyn ParserConfigRepository> {
        Arc::new(SqliteParserConfigRepository::new(self.pool.clone()))
    }

    pub fn run_log_repository(&self) -> Arc<dyn RunLogRepository> {
        Arc::new(SqliteRunLogRepository::new(self.pool.clone()))
    }

    pub fn player_repository(&self) -> Arc<dyn PlayerRepository> {
        Arc::new(SqlitePlayerRepository::new(self.pool.clone()))
    }
}

/// 连接关闭后内存库随之消失，连接必须常驻
fn memory_pool_options() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}
