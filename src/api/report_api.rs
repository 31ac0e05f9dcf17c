// ==========================================
// 家具生产引擎 - 只读报表 API
// ==========================================
// 红线: 只读, 不触发任何写入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::inventory::InventoryItem;
use crate::domain::ledger::{InventoryReceipt, InventoryUsage, ProductionAnalytics};
use crate::domain::production::{Production, ProductionProcess};
use crate::domain::tracking::OrderTracking;
use crate::domain::types::{ProductionStatus, StockStatus};
use crate::engine::{EngineWarning, LedgerReconciliation, ReorderAlert, StockLedger, TrackingSynchronizer};
use crate::repository::{
    InventoryItemRepository, InventoryLedgerRepository, OrderTrackingRepository,
    ProductionAnalyticsRepository, ProductionRepository,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 库存总览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockOverview {
    pub items: Vec<InventoryItem>,
    pub reorder_alerts: Vec<ReorderAlert>,
    pub out_of_stock_count: usize,
}

pub struct ReportApi {
    production_repo: Arc<ProductionRepository>,
    tracking_repo: Arc<OrderTrackingRepository>,
    inventory_repo: Arc<InventoryItemRepository>,
    ledger_repo: Arc<InventoryLedgerRepository>,
    analytics_repo: Arc<ProductionAnalyticsRepository>,
    ledger: Arc<StockLedger>,
    tracking: Arc<TrackingSynchronizer>,
}

impl ReportApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        production_repo: Arc<ProductionRepository>,
        tracking_repo: Arc<OrderTrackingRepository>,
        inventory_repo: Arc<InventoryItemRepository>,
        ledger_repo: Arc<InventoryLedgerRepository>,
        analytics_repo: Arc<ProductionAnalyticsRepository>,
        ledger: Arc<StockLedger>,
        tracking: Arc<TrackingSynchronizer>,
    ) -> Self {
        Self {
            production_repo,
            tracking_repo,
            inventory_repo,
            ledger_repo,
            analytics_repo,
            ledger,
            tracking,
        }
    }

    // ===== 生产 =====

    pub fn get_production(&self, order_id: &str) -> ApiResult<Production> {
        self.production_repo
            .find_by_order(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})尚无生产记录", order_id)))
    }

    pub fn list_productions(&self, status: Option<ProductionStatus>) -> ApiResult<Vec<Production>> {
        Ok(self.production_repo.list(status)?)
    }

    pub fn list_processes(&self, order_id: &str) -> ApiResult<Vec<ProductionProcess>> {
        let production = self.get_production(order_id)?;
        Ok(self.production_repo.find_processes(&production.production_id)?)
    }

    // ===== 跟踪 =====

    pub fn get_tracking(&self, order_id: &str) -> ApiResult<OrderTracking> {
        self.tracking_repo
            .find_by_order(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})尚无跟踪投影", order_id)))
    }

    pub fn list_tracking(&self) -> ApiResult<Vec<OrderTracking>> {
        Ok(self.tracking_repo.list_all()?)
    }

    pub fn detect_drift(&self, order_id: &str) -> ApiResult<Option<EngineWarning>> {
        Ok(self.tracking.detect_drift(order_id)?)
    }

    // ===== 库存与台账 =====

    pub fn stock_overview(&self) -> ApiResult<StockOverview> {
        let items = self.inventory_repo.list_all()?;
        let reorder_alerts = self.ledger.reorder_alerts()?;
        let out_of_stock_count = items
            .iter()
            .filter(|i| i.status == StockStatus::OutOfStock)
            .count();
        Ok(StockOverview {
            items,
            reorder_alerts,
            out_of_stock_count,
        })
    }

    pub fn list_usage(&self, material_id: &str, from: NaiveDate, to: NaiveDate) -> ApiResult<Vec<InventoryUsage>> {
        Self::check_range(from, to)?;
        Ok(self.ledger_repo.list_usage(material_id, from, to)?)
    }

    pub fn list_usage_by_order(&self, order_id: &str) -> ApiResult<Vec<InventoryUsage>> {
        Ok(self.ledger_repo.list_usage_by_reference(order_id)?)
    }

    pub fn list_receipts(
        &self,
        material_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<Vec<InventoryReceipt>> {
        Self::check_range(from, to)?;
        Ok(self.ledger_repo.list_receipts(material_id, from, to)?)
    }

    pub fn reconcile(&self, material_id: &str) -> ApiResult<LedgerReconciliation> {
        Ok(self.ledger.replay_balance(material_id)?)
    }

    // ===== 日产出分析 =====

    pub fn list_analytics(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<Vec<ProductionAnalytics>> {
        Self::check_range(from, to)?;
        Ok(self.analytics_repo.list_by_product(product_id, from, to)?)
    }

    pub fn daily_analytics(&self, date: NaiveDate) -> ApiResult<Vec<ProductionAnalytics>> {
        Ok(self.analytics_repo.list_by_date(date)?)
    }

    fn check_range(from: NaiveDate, to: NaiveDate) -> ApiResult<()> {
        if from > to {
            return Err(ApiError::InvalidInput(format!("日期区间非法: {} > {}", from, to)));
        }
        Ok(())
    }
}
