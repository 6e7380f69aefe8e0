pub mod sqlite_parser_config_repository;
pub mod sqlite_player_repository;
pub mod sqlite_run_log_repository;

pub use sqlite_parser_config_repository::SqliteParserConfigRepository;
pub use sqlite_player_repository::SqlitePlayerRepository;
pub use sqlite_run_log_repository::SqliteRunLogRepository;

use std::str::FromStr;

use fantasy_core::{FantasyError, FantasyResult};

/// 把文本列解码为枚举
pub(crate) fn decode_text<T>(value: &str, column: &str) -> FantasyResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| FantasyError::Internal(format!("列 {column} 数据无效: {e}")))
}
