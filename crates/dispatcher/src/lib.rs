pub mod cron_utils;
pub mod health_monitor;
pub mod scheduler;

pub use cron_utils::CronSchedule;
pub use health_monitor::{AlertSink, HealthMonitor, HealthReport, LogAlertSink, StaleParserAlert};
pub use scheduler::{ParserScheduler, SchedulerCommand, SchedulerHandle};
