// ==========================================
// 家具生产引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod inventory;
pub mod ledger;
pub mod order;
pub mod product;
pub mod production;
pub mod tracking;
pub mod types;

// 重导出核心类型
pub use inventory::{InventoryItem, StockSnapshot};
pub use ledger::{InventoryReceipt, InventoryUsage, LedgerContext, ProductionAnalytics};
pub use order::Order;
pub use product::{BillOfMaterials, BomEntry, Product};
pub use production::{Production, ProductionProcess};
pub use tracking::{OrderTracking, TimelineEntry};
pub use types::{
    AcceptanceStatus, LedgerSource, ProcessStatus, ProductClass, ProductionStatus, StockStatus,
    TrackingStatus,
};
