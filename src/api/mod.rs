// ==========================================
// 家具生产引擎 - API层
// ==========================================
// 职责: 业务接口层, 组合引擎与仓储, 转换错误
// ==========================================

pub mod error;
pub mod production_api;
pub mod report_api;

pub use error::{ApiError, ApiResult};
pub use production_api::{ProductionApi, TickReport};
pub use report_api::{ReportApi, StockOverview};
