//! 持久化层错误类型
//!
//! 区分业务可预期的错误（未找到、并发冲突、校验失败等）与存储层错误。
//! 存储层错误一律原样向上传播，由所属工作单元负责回滚。

use erp_shared::Provider;
use thiserror::Error;

/// 持久化层错误类型
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === 预期的业务错误 ===
    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("并发冲突: {entity} id={id} 未影响任何行（已被删除或修改）")]
    Conflict { entity: &'static str, id: String },

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("仓储实现未注册: interface={interface}, provider={provider}")]
    ProviderResolution {
        interface: &'static str,
        provider: Provider,
    },

    #[error("批量导入行失败: row={row}, {reason}")]
    BulkLoad { row: usize, reason: String },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("字段解码失败: {column} - {reason}")]
    Decode { column: String, reason: String },

    #[error("配置错误: {0}")]
    Config(String),
}

/// 持久化层 Result 类型别名
pub type Result<T> = std::result::Result<T, PersistenceError>;

impl PersistenceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn decode(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }

    /// 获取错误码（供上层服务翻译为用户可见的响应）
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ProviderResolution { .. } => "PROVIDER_RESOLUTION",
            Self::BulkLoad { .. } => "BULK_LOAD",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Decode { .. } => "DECODE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PersistenceError::not_found("PurchTable", 1).code(),
            "NOT_FOUND"
        );
        assert_eq!(PersistenceError::conflict("Role", 7).code(), "CONFLICT");
        assert_eq!(
            PersistenceError::ProviderResolution {
                interface: "dyn RoleRepository",
                provider: Provider::Sqlite,
            }
            .code(),
            "PROVIDER_RESOLUTION"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(PersistenceError::conflict("Role", 7).is_retryable());
        assert!(PersistenceError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!PersistenceError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(!PersistenceError::Validation("no changes".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = PersistenceError::BulkLoad {
            row: 3,
            reason: "item_id 为空".to_string(),
        };
        assert!(err.to_string().contains("row=3"));

        let err = PersistenceError::ProviderResolution {
            interface: "dyn UserRepository",
            provider: Provider::Postgres,
        };
        assert!(err.to_string().contains("postgres"));
    }
}
