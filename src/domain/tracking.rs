// ==========================================
// 家具生产引擎 - 订单跟踪投影
// ==========================================
// 红线: 完全由 Production 派生,禁止绕过同步直接编辑
// ==========================================

use crate::domain::types::{ProcessStatus, ProductClass, TrackingStatus};
use serde::{Deserialize, Serialize};

/// 时间线条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub stage: String,
    pub status: ProcessStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTracking {
    pub order_id: String,
    pub tracking_type: ProductClass,
    pub current_stage: String,
    pub status: TrackingStatus,
    pub progress_percentage: f64,
    pub process_timeline: Vec<TimelineEntry>,
}
