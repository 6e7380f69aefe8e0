use fantasy_core::FantasyResult;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error_handling::RepositoryOperation;
use crate::repo_context;

const CREATE_TABLES: &[(&str, &str)] = &[
    (
        "parser_configs",
        r#"
        CREATE TABLE IF NOT EXISTS parser_configs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            platform TEXT NOT NULL,
            parser_type TEXT NOT NULL,
            schedule TEXT,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            last_run TEXT,
            last_status TEXT NOT NULL DEFAULT 'none'
                CHECK (last_status IN ('success', 'failed', 'running', 'none')),
            config TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "parser_logs",
        // parser_config_id 只是引用，配置删除后日志保留
        r#"
        CREATE TABLE IF NOT EXISTS parser_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parser_config_id INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failed')),
            records_processed INTEGER NOT NULL DEFAULT 0,
            errors_count INTEGER NOT NULL DEFAULT 0,
            log_data TEXT,
            CHECK ((status = 'running') = (finished_at IS NULL))
        )
        "#,
    ),
    (
        "teams",
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            abbreviation TEXT,
            league TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "players",
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            web_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (first_name, last_name)
        )
        "#,
    ),
    (
        "player_platform_profiles",
        r#"
        CREATE TABLE IF NOT EXISTS player_platform_profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL REFERENCES players(id),
            platform TEXT NOT NULL,
            platform_player_id TEXT NOT NULL,
            custom_name TEXT,
            team_id INTEGER REFERENCES teams(id),
            player_position TEXT,
            current_cost REAL NOT NULL,
            ownership_percent REAL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            status TEXT,
            form REAL,
            total_points INTEGER,
            event_points INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (platform, platform_player_id)
        )
        "#,
    ),
    (
        "price_history",
        r#"
        CREATE TABLE IF NOT EXISTS price_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_profile_id INTEGER NOT NULL REFERENCES player_platform_profiles(id),
            cost REAL NOT NULL,
            ownership_percent REAL,
            recorded_at TEXT NOT NULL
        )
        "#,
    ),
];

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_parser_configs_active ON parser_configs(is_active)",
    "CREATE INDEX IF NOT EXISTS idx_parser_logs_config_started ON parser_logs(parser_config_id, started_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_parser_logs_status ON parser_logs(status)",
    "CREATE INDEX IF NOT EXISTS idx_price_history_profile ON price_history(player_profile_id, recorded_at DESC)",
];

/// 创建表结构，可重复执行
pub async fn bootstrap_schema(pool: &SqlitePool) -> FantasyResult<()> {
    for (table, ddl) in CREATE_TABLES {
        sqlx::query(ddl).execute(pool).await.map_err(|e| {
            repo_context!(RepositoryOperation::Create, "数据表", detail = *table).database_error(e)
        })?;
        debug!("数据表就绪: {}", table);
    }

    for index_sql in CREATE_INDEXES {
        sqlx::query(index_sql)
            .execute(pool)
            .await
            .map_err(|e| repo_context!(RepositoryOperation::Create, "索引").database_error(e))?;
    }

    info!("✅ 数据库表结构初始化完成");
    Ok(())
}
