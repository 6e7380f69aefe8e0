//! # Fantasy Parsers API
//!
//! 解析器配置管理、手动触发和运行记录查询的REST接口。
//!
//! ## API 端点
//!
//! - `GET /parsers` / `POST /parsers` - 配置列表 / 创建配置
//! - `GET /parsers/types` - 已注册的解析器类型
//! - `GET|PUT|DELETE /parsers/{id}` - 单个配置
//! - `POST /parsers/{id}/run` - 手动触发，返回任务ID
//! - `GET /parsers/task/{task_id}/status` - 轮询任务状态
//! - `GET /parsers/{id}/logs` - 运行历史
//! - `GET /health` / `GET /metrics`
//!
//! ## 错误响应
//!
//! ```json
//! {
//!   "error": {
//!     "code": "PARSER_NOT_FOUND",
//!     "message": "解析器配置 ID 42 不存在",
//!     "suggestions": ["请检查解析器ID是否正确"],
//!     "timestamp": "2024-01-01T00:00:00Z"
//!   }
//! }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};

/// 创建带中间件的完整应用
pub fn create_app(state: AppState, cors_enabled: bool) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(middleware::trace_layer())
            .layer(axum::middleware::from_fn(middleware::request_logging)),
    );

    if cors_enabled {
        router.layer(middleware::cors_layer())
    } else {
        router
    }
}
