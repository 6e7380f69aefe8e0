use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fantasy_core::FantasyError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("采集系统错误: {0}")]
    Fantasy(#[from] FantasyError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Vec<String>) {
        match self {
            ApiError::Fantasy(FantasyError::ParserConfigNotFound { id }) => (
                StatusCode::NOT_FOUND,
                "PARSER_NOT_FOUND",
                format!("解析器配置 ID {id} 不存在"),
                vec![
                    "请检查解析器ID是否正确".to_string(),
                    "使用 GET /parsers 查看所有解析器配置".to_string(),
                ],
            ),
            ApiError::Fantasy(FantasyError::TaskNotFound { task_id }) => (
                StatusCode::NOT_FOUND,
                "TASK_NOT_FOUND",
                format!("任务 {task_id} 不存在或结果已过期"),
                vec!["任务结果只在有限时间内保留，可通过 GET /parsers/{id}/logs 查看运行记录".to_string()],
            ),
            ApiError::Fantasy(FantasyError::UnknownParserType { parser_type }) => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_PARSER_TYPE",
                format!("未注册的解析器类型 '{parser_type}'"),
                vec!["使用 GET /parsers/types 查看可用的解析器类型".to_string()],
            ),
            ApiError::Fantasy(FantasyError::InvalidCron { expr, message }) => (
                StatusCode::BAD_REQUEST,
                "INVALID_CRON_EXPRESSION",
                format!("Cron表达式 '{expr}' 无效: {message}"),
                vec![
                    "请使用5段Cron表达式: 分 时 日 月 周".to_string(),
                    "示例: '0 */4 * * *' (每4小时执行一次)".to_string(),
                ],
            ),
            ApiError::Fantasy(FantasyError::InvalidRequest(message)) | ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("请求参数错误: {message}"),
                vec!["请检查请求格式和参数".to_string()],
            ),
            ApiError::Fantasy(other) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "系统内部错误".to_string(),
                vec![
                    "系统遇到内部错误，请稍后重试".to_string(),
                    "查看 GET /health 检查系统状态".to_string(),
                    format!("错误详情: {other}"),
                ],
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, suggestions) = self.parts();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let response = ApiError::from(FantasyError::ParserConfigNotFound { id: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::from(FantasyError::TaskNotFound {
            task_id: "abc".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let response = ApiError::from(FantasyError::unknown_parser_type("x")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(FantasyError::InvalidCron {
            expr: "bad".to_string(),
            message: "需要5个字段".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors() {
        let response = ApiError::from(FantasyError::Internal("boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
