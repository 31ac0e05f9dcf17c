// ==========================================
// 家具生产引擎 - 订单领域模型
// ==========================================
// 说明: 订单由外部订单源写入,引擎只读受理状态
// ==========================================

use crate::domain::types::AcceptanceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub acceptance_status: AcceptanceStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// 新建待受理订单
    pub fn pending(
        order_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            product_id: product_id.into(),
            quantity,
            acceptance_status: AcceptanceStatus::Pending,
            accepted_at: None,
            created_at,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.acceptance_status == AcceptanceStatus::Accepted
    }
}
