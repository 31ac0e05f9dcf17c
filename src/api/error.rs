// ==========================================
// 家具生产引擎 - API层错误类型
// ==========================================
// 职责: 将 Repository / Engine / Import 错误转换为面向调用方的错误
// ==========================================

use crate::domain::types::AcceptanceStatus;
use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("订单未受理, 不能开始生产: order_id={order_id}, status={status}")]
    OrderNotAccepted {
        order_id: String,
        status: AcceptanceStatus,
    },

    #[error("生产已完成: {0}")]
    ProductionCompleted(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 导入/配置错误
    // ==========================================
    #[error("目录导入失败: {0}")]
    ImportError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("检查约束违反: {}", msg))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::OrderNotAccepted { order_id, status } => {
                ApiError::OrderNotAccepted { order_id, status }
            }
            EngineError::ProductionCompleted(order_id) => ApiError::ProductionCompleted(order_id),
            EngineError::UnknownOrder(id) => ApiError::NotFound(format!("订单(id={})不存在", id)),
            EngineError::UnknownProduct(id) => ApiError::NotFound(format!("产品(id={})不存在", id)),
            EngineError::NoProduction(id) => {
                ApiError::NotFound(format!("订单(id={})尚无生产记录", id))
            }
            EngineError::StageNotFound(stage) => ApiError::NotFound(format!("阶段{}不存在", stage)),
            EngineError::StageAlreadyCompleted(stage) => {
                ApiError::BusinessRuleViolation(format!("阶段{}已完成, 不可延期", stage))
            }
            EngineError::NoProcessTracking(id) => {
                ApiError::BusinessRuleViolation(format!("订单{}的产品不做工序跟踪", id))
            }
            EngineError::InvalidArgument(msg) => ApiError::InvalidInput(msg),
            EngineError::Repository(e) => ApiError::from(e),
            EngineError::Lock(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => ApiError::from(e),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
