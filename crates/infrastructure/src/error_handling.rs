//! 仓储操作的错误上下文
//!
//! 仓储方法在把 `sqlx::Error` 转换为 [`FantasyError`] 之前记录操作类型和实体信息，
//! 便于从日志定位具体是哪条配置或哪次运行出错。

use std::fmt;

use fantasy_core::FantasyError;
use sqlx::Error as SqlxError;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Upsert,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "列表查询"),
            RepositoryOperation::Upsert => write!(f, "写入"),
        }
    }
}

/// 一次仓储操作的上下文
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: &'static str,
    pub id: Option<i64>,
    pub detail: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: &'static str) -> Self {
        Self {
            operation,
            entity,
            id: None,
            detail: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn entity_description(&self) -> String {
        match (&self.id, &self.detail) {
            (Some(id), Some(detail)) => format!("{} '{}' (ID: {})", self.entity, detail, id),
            (Some(id), None) => format!("{} (ID: {})", self.entity, id),
            (None, Some(detail)) => format!("{} '{}'", self.entity, detail),
            (None, None) => self.entity.to_string(),
        }
    }

    /// 记录错误日志并转换为统一错误类型
    pub fn database_error(&self, error: SqlxError) -> FantasyError {
        let reason = match &error {
            SqlxError::Database(db_error) => match db_error.constraint() {
                Some(constraint) => format!("违反约束 {constraint}"),
                None => db_error.to_string(),
            },
            SqlxError::PoolClosed => "数据库连接池已关闭".to_string(),
            SqlxError::PoolTimedOut => "数据库连接池超时".to_string(),
            other => other.to_string(),
        };
        error!(
            operation = %self.operation,
            entity = self.entity,
            id = ?self.id,
            "{}{}时发生数据库错误: {}",
            self.operation,
            self.entity_description(),
            reason
        );
        FantasyError::Database(error)
    }
}

/// 快速构造操作上下文
#[macro_export]
macro_rules! repo_context {
    ($operation:expr, $entity:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
    };
    ($operation:expr, $entity:expr, id = $id:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_id($id)
    };
    ($operation:expr, $entity:expr, detail = $detail:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_detail($detail)
    };
}
