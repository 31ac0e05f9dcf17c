// ==========================================
// 家具生产引擎 - 出入库台账与产出分析
// ==========================================
// 红线: 台账只追加,不修改
// 口径: quantity_on_hand = baseline + Σ入库 - Σ耗用
// ==========================================

use crate::domain::types::LedgerSource;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// InventoryUsage - 物料耗用台账
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryUsage {
    pub usage_id: String,
    pub material_id: String,
    pub usage_date: NaiveDate,
    pub qty_used: f64,
    pub source: LedgerSource,
    pub reference_id: Option<String>, // 订单号或产品号
    pub recorded_at: DateTime<Utc>,
}

// ==========================================
// InventoryReceipt - 入库台账
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReceipt {
    pub receipt_id: String,
    pub material_id: String,
    pub receipt_date: NaiveDate,
    pub qty_received: f64,
    pub source: LedgerSource,
    pub reference_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ==========================================
// LedgerContext - 台账写入上下文
// ==========================================
/// 每次扣减/入库携带的业务上下文
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerContext {
    pub date: NaiveDate,
    pub source: LedgerSource,
    pub reference_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerContext {
    pub fn new(
        date: NaiveDate,
        source: LedgerSource,
        reference_id: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            date,
            source,
            reference_id,
            recorded_at,
        }
    }
}

// ==========================================
// ProductionAnalytics - 日产出分析
// ==========================================
// 每个产品每个自然日一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionAnalytics {
    pub analytics_date: NaiveDate,
    pub product_id: String,
    pub target_output: u64,
    pub actual_output: u64,
    pub efficiency_percentage: f64,
}
