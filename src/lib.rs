// ==========================================
// 家具生产引擎 - 核心库
// ==========================================
// 职责: 订单受理 → 生产排程与进度 → 物料扣减 → 跟踪投影 → 日产出分析
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 目录 CSV
pub mod importer;

// 配置层 - 系统配置与阶段表
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AcceptanceStatus, LedgerSource, ProcessStatus, ProductClass, ProductionStatus, StockStatus,
    TrackingStatus,
};

// 领域实体
pub use domain::{
    BillOfMaterials, BomEntry, InventoryItem, InventoryReceipt, InventoryUsage, Order,
    OrderTracking, Product, Production, ProductionAnalytics, ProductionProcess,
};

// 引擎
pub use engine::{
    EngineError, OutputAnalyticsAggregator, ProductionScheduler, StockLedger, TrackingSynchronizer,
};

// API
pub use api::{ApiError, ProductionApi, ReportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "家具生产引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
