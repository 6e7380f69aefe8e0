//! # Fantasy Testing Utils
//!
//! 各 crate 测试共用的工具：测试数据构建器、内存数据库、
//! 可控行为的解析器适配器和记录调用的任务执行器。
//!
//! ```toml
//! [dev-dependencies]
//! fantasy-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
