// ==========================================
// 家具生产引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: *_tx 关联函数供引擎在同一事务内组合多表写入
// ==========================================

pub mod analytics_repo;
pub mod error;
pub mod inventory_repo;
pub mod ledger_repo;
pub mod order_repo;
pub mod product_repo;
pub mod production_repo;
pub mod sql_types;
pub mod tracking_repo;

// 重导出核心仓储
pub use analytics_repo::ProductionAnalyticsRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use inventory_repo::InventoryItemRepository;
pub use ledger_repo::InventoryLedgerRepository;
pub use order_repo::OrderRepository;
pub use product_repo::ProductRepository;
pub use production_repo::ProductionRepository;
pub use tracking_repo::OrderTrackingRepository;
