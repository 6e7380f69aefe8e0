pub mod health;
pub mod metrics;
pub mod parsers;
pub mod tasks;
