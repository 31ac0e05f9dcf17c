// ==========================================
// 家具生产引擎 - 引擎错误与告警
// ==========================================
// 约定: 错误 (EngineError) 中断操作并回滚事务
// 约定: 告警 (EngineWarning) 随结果返回, 操作照常提交
// ==========================================

use crate::domain::types::AcceptanceStatus;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("订单未受理: order_id={order_id}, status={status}")]
    OrderNotAccepted {
        order_id: String,
        status: AcceptanceStatus,
    },

    #[error("订单不存在: {0}")]
    UnknownOrder(String),

    #[error("产品不存在: {0}")]
    UnknownProduct(String),

    #[error("订单尚无生产记录: {0}")]
    NoProduction(String),

    #[error("生产已完成, 不可再变更: order_id={0}")]
    ProductionCompleted(String),

    #[error("阶段不存在: {0}")]
    StageNotFound(String),

    #[error("阶段已完成, 不可延期: {0}")]
    StageAlreadyCompleted(String),

    #[error("该产品分类不做工序跟踪: order_id={0}")]
    NoProcessTracking(String),

    #[error("参数非法: {0}")]
    InvalidArgument(String),

    #[error("存储层错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("锁获取失败: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Repository(RepositoryError::from(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

// ==========================================
// EngineWarning - 非致命告警
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// 库存不足, 实扣量被截断
    InsufficientStock {
        material_id: String,
        requested: f64,
        debited: f64,
    },
    /// 产品没有 BOM
    MissingBom { product_id: String },
    /// 当日原料不足以生产任何一件
    ZeroOutput { product_id: String },
    /// 连续生产品未配置成品库存项, 产出不入库
    MissingFinishedGoodsMaterial { product_id: String },
    /// 跟踪投影与生产记录不一致 (同步前)
    TrackingDrift { order_id: String },
    /// 当日产出已记录, 跳过
    AlreadyRecorded { product_id: String },
}
