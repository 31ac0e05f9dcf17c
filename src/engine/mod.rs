// ==========================================
// 家具生产引擎 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 多表写入经 Repository 的 *_tx 组合在同一事务
// ==========================================

pub mod bom_resolver;
pub mod error;
pub mod output_aggregator;
pub mod production_scheduler;
pub mod stock_ledger;
pub mod tracking_sync;

// 重导出核心引擎
pub use bom_resolver::BillOfMaterialsResolver;
pub use error::{EngineError, EngineResult, EngineWarning};
pub use output_aggregator::{
    BatchOutputReport, DailyOutputInput, DailyOutputOutcome, DailyOutputStatus,
    OutputAnalyticsAggregator,
};
pub use production_scheduler::{AcceptOutcome, DelayOutcome, ProductionScheduler, TickSummary};
pub use stock_ledger::{CreditResult, DebitResult, LedgerReconciliation, ReorderAlert, StockLedger};
pub use tracking_sync::{SyncAllSummary, SyncOutcome, TrackingSynchronizer};
