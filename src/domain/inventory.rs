// ==========================================
// 家具生产引擎 - 库存项领域模型
// ==========================================
// 红线: quantity_on_hand >= 0
// 红线: status 为派生字段,随数量变更同步重算
// ==========================================

use crate::domain::types::StockStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 库存快照: material_id → 可用数量
pub type StockSnapshot = HashMap<String, f64>;

// ==========================================
// InventoryItem - 库存项 (原材料或成品)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub material_id: String,
    pub sku: String,
    pub name: String,
    pub unit: String,

    // ===== 数量 =====
    pub quantity_on_hand: f64,  // 当前在库
    pub baseline_quantity: f64, // 台账回放基线

    // ===== 库存策略阈值 =====
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub max_level: f64,

    // ===== 派生状态 =====
    pub status: StockStatus,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// 创建新的库存项 (基线 = 初始在库, 状态即时派生)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        material_id: impl Into<String>,
        sku: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
        quantity_on_hand: f64,
        safety_stock: f64,
        reorder_point: f64,
        max_level: f64,
    ) -> Self {
        let quantity_on_hand = quantity_on_hand.max(0.0);
        Self {
            material_id: material_id.into(),
            sku: sku.into(),
            name: name.into(),
            unit: unit.into(),
            quantity_on_hand,
            baseline_quantity: quantity_on_hand,
            safety_stock,
            reorder_point,
            max_level,
            status: StockStatus::derive(quantity_on_hand, reorder_point),
            updated_at: Utc::now(),
        }
    }

    /// 按当前数量重新派生状态
    pub fn derived_status(&self) -> StockStatus {
        StockStatus::derive(self.quantity_on_hand, self.reorder_point)
    }

    /// 距最高库存的剩余容量 (max_level 为 0 视为不设上限)
    pub fn headroom(&self) -> Option<f64> {
        if self.max_level <= 0.0 {
            None
        } else {
            Some((self.max_level - self.quantity_on_hand).max(0.0))
        }
    }

    /// 是否跌破安全库存
    pub fn below_safety_stock(&self) -> bool {
        self.quantity_on_hand < self.safety_stock
    }
}
