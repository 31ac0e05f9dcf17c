// ==========================================
// 家具生产引擎 - 生产聚合领域模型
// ==========================================
// 红线: Production 只为已受理订单存在 (1:1)
// 红线: overall_progress 单调不减, Completed 为终态
// ==========================================

use crate::domain::types::{ProcessStatus, ProductClass, ProductionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Production - 生产记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub production_id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_class: ProductClass,
    pub quantity: u32,

    // ===== 进度 =====
    pub current_stage: String,
    pub status: ProductionStatus,
    pub overall_progress: f64, // [0, 100]

    // ===== 时间 =====
    pub production_started_at: DateTime<Utc>,
    pub estimated_completion_date: DateTime<Utc>,
    pub actual_completion_date: Option<DateTime<Utc>>,
}

impl Production {
    pub fn is_completed(&self) -> bool {
        self.status == ProductionStatus::Completed
    }
}

// ==========================================
// ProductionProcess - 工序子记录
// ==========================================
// 只有 MadeToOrder 产品才生成,每个工序一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionProcess {
    pub process_id: String,
    pub production_id: String,
    pub process_name: String,
    pub process_order: i32, // 从 1 开始
    pub status: ProcessStatus,

    // ===== 工期 =====
    pub estimated_duration_days: f64, // 工序分配工期
    pub delay_days: f64,              // 累计延期

    // ===== 排程窗口 (由前序工序有效工期累加推算) =====
    pub planned_start_at: DateTime<Utc>,
    pub planned_end_at: DateTime<Utc>,

    // ===== 实际时间 =====
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    // ===== 延期 =====
    pub is_delayed: bool,
    pub delay_reason: Option<String>,
}

impl ProductionProcess {
    /// 有效工期 = 分配工期 + 累计延期
    pub fn effective_duration_days(&self) -> f64 {
        self.estimated_duration_days + self.delay_days
    }
}
