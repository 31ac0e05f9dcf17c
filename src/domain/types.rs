// ==========================================
// 家具生产引擎 - 领域类型定义
// ==========================================
// 职责: 定义产品分类、各类状态枚举
// 序列化格式: snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 产品分类 (Product Class)
// ==========================================
// 红线: 分类在目录定义时显式设置,运行期绝不从名称推断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductClass {
    StockedGood, // 连续生产的库存品 (不做工序建模)
    MadeToOrder, // 按单定制 (逐工序跟踪)
}

impl ProductClass {
    /// 是否需要逐工序 (ProductionProcess) 建模
    pub fn tracks_processes(&self) -> bool {
        matches!(self, ProductClass::MadeToOrder)
    }

    /// 是否属于连续生产品 (走日产出聚合)
    pub fn is_continuously_produced(&self) -> bool {
        matches!(self, ProductClass::StockedGood)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductClass::StockedGood => "stocked_good",
            ProductClass::MadeToOrder => "made_to_order",
        }
    }

    /// 从数据库/目录字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stocked_good" => Some(ProductClass::StockedGood),
            "made_to_order" => Some(ProductClass::MadeToOrder),
            _ => None,
        }
    }
}

impl fmt::Display for ProductClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 订单受理状态 (Acceptance Status)
// ==========================================
// 状态机: pending → accepted | rejected, accepted 之后不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceStatus {
    Pending,
    Accepted,
    Rejected,
}

impl AcceptanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptanceStatus::Pending => "pending",
            AcceptanceStatus::Accepted => "accepted",
            AcceptanceStatus::Rejected => "rejected",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(AcceptanceStatus::Pending),
            "accepted" => Some(AcceptanceStatus::Accepted),
            "rejected" => Some(AcceptanceStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for AcceptanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 生产状态 (Production Status)
// ==========================================
// Completed 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    InProgress,
    Completed,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::InProgress => "in_progress",
            ProductionStatus::Completed => "completed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "in_progress" => Some(ProductionStatus::InProgress),
            "completed" => Some(ProductionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 工序状态 (Process Status)
// ==========================================
// 同时用于工序记录与跟踪时间线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    InProgress,
    Completed,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::InProgress => "in_progress",
            ProcessStatus::Completed => "completed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(ProcessStatus::Pending),
            "in_progress" => Some(ProcessStatus::InProgress),
            "completed" => Some(ProcessStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 库存状态 (Stock Status)
// ==========================================
// 派生字段: 每次数量变更后同步重算,不可独立写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    ReorderNow,
    OutOfStock,
}

impl StockStatus {
    /// 由在库数量与再订货点派生状态
    ///
    /// # 规则
    /// - quantity_on_hand <= 0 → out_of_stock
    /// - quantity_on_hand <= reorder_point → reorder_now
    /// - 其余 → in_stock
    pub fn derive(quantity_on_hand: f64, reorder_point: f64) -> Self {
        if quantity_on_hand <= 0.0 {
            StockStatus::OutOfStock
        } else if quantity_on_hand <= reorder_point {
            StockStatus::ReorderNow
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::ReorderNow => "reorder_now",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "in_stock" => Some(StockStatus::InStock),
            "reorder_now" => Some(StockStatus::ReorderNow),
            "out_of_stock" => Some(StockStatus::OutOfStock),
            _ => None,
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 跟踪状态 (Tracking Status)
// ==========================================
// 面向客户的投影状态,完全由 Production 派生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Pending,
    InProduction,
    ReadyForDelivery,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Pending => "pending",
            TrackingStatus::InProduction => "in_production",
            TrackingStatus::ReadyForDelivery => "ready_for_delivery",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(TrackingStatus::Pending),
            "in_production" => Some(TrackingStatus::InProduction),
            "ready_for_delivery" => Some(TrackingStatus::ReadyForDelivery),
            _ => None,
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 台账来源 (Ledger Source)
// ==========================================
// 标识每条出入库台账的业务来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSource {
    OrderProduction,  // 订单受理时的 BOM 扣减
    DailyProduction,  // 日产出聚合的 BOM 扣减
    ProductionOutput, // 日产出成品入库
    Restock,          // 采购补货入库
}

impl LedgerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerSource::OrderProduction => "order_production",
            LedgerSource::DailyProduction => "daily_production",
            LedgerSource::ProductionOutput => "production_output",
            LedgerSource::Restock => "restock",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "order_production" => Some(LedgerSource::OrderProduction),
            "daily_production" => Some(LedgerSource::DailyProduction),
            "production_output" => Some(LedgerSource::ProductionOutput),
            "restock" => Some(LedgerSource::Restock),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status_boundaries() {
        assert_eq!(StockStatus::derive(0.0, 10.0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::derive(-1.0, 10.0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::derive(10.0, 10.0), StockStatus::ReorderNow);
        assert_eq!(StockStatus::derive(10.5, 10.0), StockStatus::InStock);
        // 再订货点为 0 时,正库存即为 in_stock
        assert_eq!(StockStatus::derive(0.1, 0.0), StockStatus::InStock);
    }

    #[test]
    fn test_db_str_round_trip_is_case_insensitive() {
        assert_eq!(
            ProductClass::from_db_str("MADE_TO_ORDER"),
            Some(ProductClass::MadeToOrder)
        );
        assert_eq!(
            TrackingStatus::from_db_str(TrackingStatus::ReadyForDelivery.as_str()),
            Some(TrackingStatus::ReadyForDelivery)
        );
        assert_eq!(AcceptanceStatus::from_db_str("unknown"), None);
    }

    #[test]
    fn test_product_class_policies() {
        assert!(ProductClass::MadeToOrder.tracks_processes());
        assert!(!ProductClass::StockedGood.tracks_processes());
        assert!(ProductClass::StockedGood.is_continuously_produced());
    }
}
