//! 测试环境辅助函数

use std::future::Future;
use std::time::Duration;

use fantasy_infrastructure::DatabaseManager;
use tokio::time::sleep;

/// 已建表的内存数据库
pub async fn test_database() -> DatabaseManager {
    DatabaseManager::in_memory()
        .await
        .expect("failed to create in-memory database")
}

pub struct TestEnv;

impl TestEnv {
    /// 轮询直到条件成立或超时
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }

        false
    }
}
