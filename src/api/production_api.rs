// ==========================================
// 家具生产引擎 - 生产操作 API
// ==========================================
// 职责: 组合调度/跟踪/台账/日产出引擎, 对外提供写操作
// 约定: 每个改变生产记录的操作之后同步该订单的跟踪投影
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::order::Order;
use crate::domain::production::Production;
use crate::engine::{
    AcceptOutcome, BatchOutputReport, CreditResult, DailyOutputInput, DailyOutputOutcome,
    DelayOutcome, OutputAnalyticsAggregator, ProductionScheduler, StockLedger, SyncAllSummary,
    SyncOutcome, TickSummary, TrackingSynchronizer,
};
use crate::repository::OrderRepository;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// 时间推进报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub now: DateTime<Utc>,
    pub advance: TickSummary,
    pub sync: SyncAllSummary,
}

pub struct ProductionApi {
    order_repo: Arc<OrderRepository>,
    scheduler: Arc<ProductionScheduler>,
    tracking: Arc<TrackingSynchronizer>,
    aggregator: Arc<OutputAnalyticsAggregator>,
    ledger: Arc<StockLedger>,
}

impl ProductionApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        scheduler: Arc<ProductionScheduler>,
        tracking: Arc<TrackingSynchronizer>,
        aggregator: Arc<OutputAnalyticsAggregator>,
        ledger: Arc<StockLedger>,
    ) -> Self {
        Self {
            order_repo,
            scheduler,
            tracking,
            aggregator,
            ledger,
        }
    }

    // ==========================================
    // 订单
    // ==========================================

    /// 登记新订单 (pending) 并建立跟踪投影
    pub fn register_order(&self, order: &Order) -> ApiResult<SyncOutcome> {
        if order.quantity == 0 {
            return Err(ApiError::InvalidInput(format!(
                "订单数量必须大于 0: order_id={}",
                order.order_id
            )));
        }
        self.order_repo.insert(order)?;
        Ok(self.tracking.sync(&order.order_id)?)
    }

    /// 受理订单并开始生产 (受理与生产记录同一事务提交)
    pub fn accept_order(&self, order_id: &str, now: DateTime<Utc>) -> ApiResult<AcceptOutcome> {
        let outcome = self.scheduler.accept_and_start(order_id, now)?;
        self.after_accept(order_id, outcome)
    }

    /// 为已受理订单开始生产 (订单源已写入受理状态时使用)
    pub fn start_production(&self, order_id: &str, now: DateTime<Utc>) -> ApiResult<AcceptOutcome> {
        let outcome = self.scheduler.accept_order(order_id, now)?;
        self.after_accept(order_id, outcome)
    }

    fn after_accept(&self, order_id: &str, outcome: AcceptOutcome) -> ApiResult<AcceptOutcome> {
        for w in &outcome.warnings {
            warn!(order_id = %order_id, warning = ?w, "生产受理告警");
        }
        self.tracking.sync(order_id)?;
        Ok(outcome)
    }

    pub fn reject_order(&self, order_id: &str) -> ApiResult<SyncOutcome> {
        self.order_repo.mark_rejected(order_id)?;
        Ok(self.tracking.sync(order_id)?)
    }

    // ==========================================
    // 进度
    // ==========================================

    pub fn advance(&self, order_id: &str, progress: f64, now: DateTime<Utc>) -> ApiResult<Production> {
        let production = self.scheduler.advance(order_id, progress, now)?;
        self.tracking.sync(order_id)?;
        Ok(production)
    }

    pub fn delay_stage(
        &self,
        order_id: &str,
        stage_name: &str,
        extra_days: f64,
        reason: &str,
    ) -> ApiResult<DelayOutcome> {
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("延期原因不能为空".to_string()));
        }
        let outcome = self.scheduler.delay_stage(order_id, stage_name, extra_days, reason)?;
        self.tracking.sync(order_id)?;
        Ok(outcome)
    }

    /// 时间推进: 推进全部在制生产并重新同步全部跟踪投影
    pub fn tick(&self, now: DateTime<Utc>) -> ApiResult<TickReport> {
        let advance = self.scheduler.advance_all(now)?;
        let sync = self.tracking.sync_all()?;
        info!(
            advanced = advance.advanced,
            completed = advance.completed,
            synced = sync.synced,
            "时间推进完成"
        );
        Ok(TickReport { now, advance, sync })
    }

    // ==========================================
    // 日产出与库存
    // ==========================================

    pub fn record_daily_output(
        &self,
        product_id: &str,
        date: NaiveDate,
        candidate_output: u64,
        now: DateTime<Utc>,
    ) -> ApiResult<DailyOutputOutcome> {
        Ok(self.aggregator.run_day(product_id, date, candidate_output, now)?)
    }

    pub fn record_daily_outputs(
        &self,
        date: NaiveDate,
        inputs: &[DailyOutputInput],
        now: DateTime<Utc>,
    ) -> ApiResult<BatchOutputReport> {
        Ok(self.aggregator.run_batch(date, inputs, now)?)
    }

    pub fn restock(
        &self,
        material_id: &str,
        qty: f64,
        receipt_date: NaiveDate,
        reference_id: Option<String>,
        now: DateTime<Utc>,
    ) -> ApiResult<CreditResult> {
        if !(qty > 0.0) {
            return Err(ApiError::InvalidInput(format!("补货数量必须大于 0: {}", qty)));
        }
        Ok(self.ledger.restock(material_id, qty, receipt_date, reference_id, now)?)
    }
}
