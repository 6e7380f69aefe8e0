use thiserror::Error;

/// 采集系统错误类型定义
///
/// 前六个变体对应解析任务的失败分类：
/// - 单条记录映射失败（`MappingError`）在本地计数后跳过，不会导致整次运行失败
/// - 其余运行级错误会将本次 RunLog 标记为 failed，并把诊断信息写入 log_data
#[derive(Debug, Error)]
pub enum FantasyError {
    #[error("UnknownParserType: 未注册的解析器类型 '{parser_type}'")]
    UnknownParserType { parser_type: String },

    #[error("UpstreamUnavailable: 上游平台不可用: {0}")]
    UpstreamUnavailable(String),

    #[error("UpstreamFormatError: 上游数据格式异常: {0}")]
    UpstreamFormatError(String),

    #[error("MappingError: 记录 {record} 无法映射: {message}")]
    MappingError { record: String, message: String },

    #[error("TaskTimeout: 任务执行超过 {seconds} 秒被强制终止")]
    TaskTimeout { seconds: u64 },

    #[error("TaskNotFound: 任务 {task_id} 不存在或已过期")]
    TaskNotFound { task_id: String },

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("解析器配置未找到: {id}")]
    ParserConfigNotFound { id: i64 },

    #[error("运行日志未找到: {id}")]
    RunLogNotFound { id: i64 },

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("无效的请求参数: {0}")]
    InvalidRequest(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl FantasyError {
    pub fn mapping(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MappingError {
            record: record.into(),
            message: message.into(),
        }
    }

    pub fn unknown_parser_type(parser_type: impl Into<String>) -> Self {
        Self::UnknownParserType {
            parser_type: parser_type.into(),
        }
    }

    /// 可以等待下一次调度重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::TaskTimeout { .. }
        )
    }
}

/// 统一的Result类型
pub type FantasyResult<T> = std::result::Result<T, FantasyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_taxonomy_marker() {
        let err = FantasyError::unknown_parser_type("nonexistent");
        assert!(err.to_string().contains("UnknownParserType"));
        assert!(err.to_string().contains("nonexistent"));

        let err = FantasyError::TaskTimeout { seconds: 300 };
        assert!(err.to_string().starts_with("TaskTimeout"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(FantasyError::UpstreamUnavailable("connection reset".into()).is_transient());
        assert!(!FantasyError::UpstreamFormatError("missing elements".into()).is_transient());
        assert!(!FantasyError::mapping("player 1", "bad position").is_transient());
    }
}
