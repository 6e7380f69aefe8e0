pub mod manager;
pub mod schema;
pub mod sqlite;

pub use manager::DatabaseManager;
pub use schema::bootstrap_schema;
pub use sqlite::{SqliteParserConfigRepository, SqlitePlayerRepository, SqliteRunLogRepository};
