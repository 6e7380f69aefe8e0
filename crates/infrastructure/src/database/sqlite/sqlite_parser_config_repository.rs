use async_trait::async_trait;
use chrono::Utc;
use fantasy_core::{
    models::{LastStatus, NewParserConfig, ParserConfig, Platform},
    traits::ParserConfigRepository,
    FantasyError, FantasyResult,
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use super::decode_text;
use crate::error_handling::RepositoryOperation;
use crate::repo_context;

const ENTITY: &str = "解析器配置";

const COLUMNS: &str = "id, name, platform, parser_type, schedule, is_active, last_run, \
                       last_status, config, created_at, updated_at";

pub struct SqliteParserConfigRepository {
    pool: SqlitePool,
}

impl SqliteParserConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_parser_config(row: &SqliteRow) -> FantasyResult<ParserConfig> {
        let platform: String = row.try_get("platform")?;
        let last_status: String = row.try_get("last_status")?;
        let config: String = row.try_get("config")?;

        Ok(ParserConfig {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            platform: decode_text::<Platform>(&platform, "platform")?,
            parser_type: row.try_get("parser_type")?,
            schedule: row.try_get("schedule")?,
            is_active: row.try_get("is_active")?,
            last_run: row.try_get("last_run")?,
            last_status: decode_text::<LastStatus>(&last_status, "last_status")?,
            config: serde_json::from_str(&config)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ParserConfigRepository for SqliteParserConfigRepository {
    #[instrument(skip(self, config), fields(name = %config.name, parser_type = %config.parser_type))]
    async fn create(&self, config: &NewParserConfig) -> FantasyResult<ParserConfig> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO parser_configs (name, platform, parser_type, schedule, is_active, \
             last_status, config, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 'none', ?, ?, ?) RETURNING {COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(config.name.trim())
            .bind(config.platform.as_str())
            .bind(&config.parser_type)
            .bind(&config.schedule)
            .bind(config.is_active)
            .bind(serde_json::to_string(&config.config)?)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                repo_context!(RepositoryOperation::Create, ENTITY, detail = config.name.as_str())
                    .database_error(e)
            })?;

        let created = Self::row_to_parser_config(&row)?;
        debug!("创建解析器配置成功: {} (ID: {})", created.name, created.id);
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> FantasyResult<Option<ParserConfig>> {
        let sql = format!("SELECT {COLUMNS} FROM parser_configs WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| repo_context!(RepositoryOperation::Read, ENTITY, id = id).database_error(e))?;

        row.as_ref().map(Self::row_to_parser_config).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, skip: i64, limit: i64) -> FantasyResult<Vec<ParserConfig>> {
        let sql = format!("SELECT {COLUMNS} FROM parser_configs ORDER BY id LIMIT ? OFFSET ?");
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| repo_context!(RepositoryOperation::Query, ENTITY).database_error(e))?;

        rows.iter().map(Self::row_to_parser_config).collect()
    }

    #[instrument(skip(self))]
    async fn list_active(&self) -> FantasyResult<Vec<ParserConfig>> {
        let sql = format!("SELECT {COLUMNS} FROM parser_configs WHERE is_active = 1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| repo_context!(RepositoryOperation::Query, ENTITY).database_error(e))?;

        rows.iter().map(Self::row_to_parser_config).collect()
    }

    #[instrument(skip(self, config), fields(id = config.id))]
    async fn update(&self, config: &ParserConfig) -> FantasyResult<ParserConfig> {
        let sql = format!(
            "UPDATE parser_configs SET name = ?, platform = ?, parser_type = ?, schedule = ?, \
             is_active = ?, config = ?, updated_at = ? WHERE id = ? RETURNING {COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(config.name.trim())
            .bind(config.platform.as_str())
            .bind(&config.parser_type)
            .bind(&config.schedule)
            .bind(config.is_active)
            .bind(serde_json::to_string(&config.config)?)
            .bind(Utc::now())
            .bind(config.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                repo_context!(RepositoryOperation::Update, ENTITY, id = config.id).database_error(e)
            })?;

        match row {
            Some(row) => {
                debug!("更新解析器配置成功: ID {}", config.id);
                Self::row_to_parser_config(&row)
            }
            None => Err(FantasyError::ParserConfigNotFound { id: config.id }),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> FantasyResult<bool> {
        let result = sqlx::query("DELETE FROM parser_configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| repo_context!(RepositoryOperation::Delete, ENTITY, id = id).database_error(e))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!("删除解析器配置成功: ID {}", id);
        }
        Ok(deleted)
    }
}
