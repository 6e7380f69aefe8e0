pub mod config;
pub mod errors;
pub mod models;
pub mod parser_registry;
pub mod run_journal;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use parser_registry::*;
pub use run_journal::*;
pub use traits::{
    ParserAdapter, ParserConfigRepository, PlayerRepository, PlayerUpsert, RunContext,
    RunLogRepository, TaskExecutor, TaskStatusService,
};
