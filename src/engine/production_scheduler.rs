// ==========================================
// 家具生产引擎 - 生产调度引擎
// ==========================================
// 职责: 受理订单 → 建立生产记录 → 扣减物料 → 推进进度 → 延期重排
// 红线: 未受理的订单不得生成生产记录
// 红线: 进度单调不减, Completed 为终态
// 红线: 每个操作在单个 IMMEDIATE 事务内完成
// ==========================================

pub mod schedule;

use crate::config::engine_config_trait::EngineConfig;
use crate::config::stage_definition::StageTable;
use crate::db::begin_immediate;
use crate::domain::ledger::LedgerContext;
use crate::domain::order::Order;
use crate::domain::production::{Production, ProductionProcess};
use crate::domain::types::{LedgerSource, ProcessStatus, ProductionStatus};
use crate::engine::bom_resolver::BillOfMaterialsResolver;
use crate::engine::error::{EngineError, EngineResult, EngineWarning};
use crate::engine::stock_ledger::{DebitResult, StockLedger};
use crate::repository::order_repo::OrderRepository;
use crate::repository::product_repo::ProductRepository;
use crate::repository::production_repo::ProductionRepository;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;
use uuid::Uuid;

/// 单个阶段累计延期上限 (天)
pub const MAX_DELAY_DAYS: f64 = 3650.0;

// ==========================================
// AcceptOutcome - 受理结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptOutcome {
    pub production: Production,
    pub processes: Vec<ProductionProcess>,
    pub debits: Vec<DebitResult>,
    pub warnings: Vec<EngineWarning>,
    /// false 表示订单已有生产记录, 本次未做任何写入
    pub newly_created: bool,
}

// ==========================================
// DelayOutcome - 延期结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayOutcome {
    pub production: Production,
    pub processes: Vec<ProductionProcess>,
    /// 预计完工时间平移量 (天)
    pub shifted_days: f64,
}

// ==========================================
// TickSummary - 批量推进汇总
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickSummary {
    pub advanced: usize,
    pub completed: usize,
    pub failures: Vec<(String, String)>, // (order_id, 错误信息)
}

// ==========================================
// ProductionScheduler - 生产调度引擎
// ==========================================
pub struct ProductionScheduler {
    conn: Arc<Mutex<Connection>>,
    config: Arc<EngineConfig>,
}

impl ProductionScheduler {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<EngineConfig>) -> Self {
        Self { conn, config }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Lock(e.to_string()))
    }

    // ==========================================
    // 受理订单
    // ==========================================

    /// 为已受理订单建立生产记录并扣减物料
    ///
    /// # 参数
    /// - order_id: 订单号
    /// - now: 当前时间 (用于推算起始进度与台账时间)
    ///
    /// # 返回
    /// - OrderNotAccepted: 订单未受理, 不写入任何数据
    /// - 订单已有生产记录: 原样返回, 不重复扣减
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn accept_order(&self, order_id: &str, now: DateTime<Utc>) -> EngineResult<AcceptOutcome> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;
        let outcome = self.start_production_tx(&tx, order_id, now)?;
        tx.commit()?;
        Self::log_accepted(&outcome);
        Ok(outcome)
    }

    /// 受理 pending 订单并建立生产记录
    ///
    /// 状态变更、物料扣减与生产记录在同一事务内提交;
    /// 任一步失败时订单保持 pending
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn accept_and_start(&self, order_id: &str, now: DateTime<Utc>) -> EngineResult<AcceptOutcome> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;

        Self::require_order_tx(&tx, order_id)?;
        OrderRepository::mark_accepted_tx(&tx, order_id, now)?;
        let outcome = self.start_production_tx(&tx, order_id, now)?;
        tx.commit()?;

        Self::log_accepted(&outcome);
        Ok(outcome)
    }

    fn start_production_tx(
        &self,
        tx: &Connection,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<AcceptOutcome> {
        let order = Self::require_order_tx(tx, order_id)?;
        if !order.is_accepted() {
            return Err(EngineError::OrderNotAccepted {
                order_id: order.order_id,
                status: order.acceptance_status,
            });
        }

        if let Some(existing) = ProductionRepository::find_by_order_tx(tx, order_id)? {
            let processes = ProductionRepository::find_processes_tx(tx, &existing.production_id)?;
            tracing::debug!(production_id = %existing.production_id, "订单已有生产记录, 跳过");
            return Ok(AcceptOutcome {
                production: existing,
                processes,
                debits: Vec::new(),
                warnings: Vec::new(),
                newly_created: false,
            });
        }

        let product = ProductRepository::find_by_id_tx(tx, &order.product_id)?
            .ok_or_else(|| EngineError::UnknownProduct(order.product_id.clone()))?;
        let bom = BillOfMaterialsResolver::resolve_tx(tx, &product.product_id)?;

        // ===== 物料扣减 =====
        let mut warnings = Vec::new();
        let mut debits = Vec::new();
        if bom.is_empty() {
            tracing::warn!(product_id = %product.product_id, "产品没有 BOM, 不扣减物料");
            warnings.push(EngineWarning::MissingBom {
                product_id: product.product_id.clone(),
            });
        } else {
            let ctx = LedgerContext::new(
                now.date_naive(),
                LedgerSource::OrderProduction,
                Some(order.order_id.clone()),
                now,
            );
            for (material_id, requested) in bom.requirements_for(f64::from(order.quantity)) {
                let debit = StockLedger::debit_tx(tx, &material_id, requested, &ctx)?;
                if debit.is_short() {
                    warnings.push(EngineWarning::InsufficientStock {
                        material_id: debit.material_id.clone(),
                        requested: debit.requested,
                        debited: debit.debited,
                    });
                }
                debits.push(debit);
            }
        }

        // ===== 生产记录与工序 =====
        let table = self.config.stages.table_for(product.product_class);
        let started_at = order.accepted_at.unwrap_or(now);
        let production_id = Uuid::new_v4().to_string();

        let mut processes = if product.product_class.tracks_processes() {
            Self::build_processes(&production_id, table, started_at)?
        } else {
            Vec::new()
        };
        let cycle_days = Self::cycle_days(table, &processes);

        let mut production = Production {
            production_id: production_id.clone(),
            order_id: order.order_id.clone(),
            product_id: product.product_id.clone(),
            product_class: product.product_class,
            quantity: order.quantity,
            current_stage: table.first().name.clone(),
            status: ProductionStatus::InProgress,
            overall_progress: 0.0,
            production_started_at: started_at,
            estimated_completion_date: schedule::add_days(started_at, cycle_days)?,
            actual_completion_date: None,
        };

        let initial = self
            .config
            .min_visible_progress_pct
            .max(schedule::elapsed_progress(started_at, now, cycle_days));
        schedule::apply_progress(&mut production, &mut processes, table, initial, now);

        ProductionRepository::insert_tx(tx, &production)?;
        ProductionRepository::insert_processes_tx(tx, &processes)?;

        Ok(AcceptOutcome {
            production,
            processes,
            debits,
            warnings,
            newly_created: true,
        })
    }

    fn log_accepted(outcome: &AcceptOutcome) {
        if !outcome.newly_created {
            return;
        }
        tracing::info!(
            production_id = %outcome.production.production_id,
            product_class = %outcome.production.product_class,
            progress = outcome.production.overall_progress,
            stage = %outcome.production.current_stage,
            debit_lines = outcome.debits.len(),
            warnings = outcome.warnings.len(),
            "生产记录已建立"
        );
    }

    // ==========================================
    // 推进进度
    // ==========================================

    /// 按外部给定进度推进
    ///
    /// # 说明
    /// - 新进度小于原进度时保持原进度
    #[instrument(skip(self), fields(order_id = %order_id, progress = %elapsed_progress))]
    pub fn advance(&self, order_id: &str, elapsed_progress: f64, now: DateTime<Utc>) -> EngineResult<Production> {
        if !elapsed_progress.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "进度必须为有限数: {}",
                elapsed_progress
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;
        let production = self.advance_tx(&tx, order_id, |_, _| elapsed_progress, now)?;
        tx.commit()?;
        Ok(production)
    }

    /// 按已过时间推进 (有效周期含延期)
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn advance_to(&self, order_id: &str, now: DateTime<Utc>) -> EngineResult<Production> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;
        let production = self.advance_tx(
            &tx,
            order_id,
            |production, cycle_days| {
                schedule::elapsed_progress(production.production_started_at, now, cycle_days)
            },
            now,
        )?;
        tx.commit()?;
        Ok(production)
    }

    /// 推进全部在制生产记录; 单条失败不影响其余
    pub fn advance_all(&self, now: DateTime<Utc>) -> EngineResult<TickSummary> {
        let in_progress = {
            let conn = self.get_conn()?;
            ProductionRepository::list_tx(&conn, Some(ProductionStatus::InProgress))?
        };

        let mut summary = TickSummary::default();
        for production in in_progress {
            match self.advance_to(&production.order_id, now) {
                Ok(updated) => {
                    summary.advanced += 1;
                    if updated.is_completed() {
                        summary.completed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(order_id = %production.order_id, error = %e, "推进失败");
                    summary.failures.push((production.order_id.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            advanced = summary.advanced,
            completed = summary.completed,
            failed = summary.failures.len(),
            "在制生产推进完成"
        );
        Ok(summary)
    }

    fn advance_tx<F>(
        &self,
        conn: &Connection,
        order_id: &str,
        progress_fn: F,
        now: DateTime<Utc>,
    ) -> EngineResult<Production>
    where
        F: FnOnce(&Production, f64) -> f64,
    {
        let mut production = Self::require_open_production_tx(conn, order_id)?;
        let mut processes = ProductionRepository::find_processes_tx(conn, &production.production_id)?;
        let table = self.config.stages.table_for(production.product_class);

        let cycle_days = Self::cycle_days(table, &processes);
        let target = progress_fn(&production, cycle_days);
        let before = production.overall_progress;

        schedule::apply_progress(&mut production, &mut processes, table, target, now);

        ProductionRepository::update_progress_tx(conn, &production)?;
        ProductionRepository::update_processes_tx(conn, &processes)?;

        tracing::debug!(
            from = before,
            to = production.overall_progress,
            stage = %production.current_stage,
            status = %production.status,
            "生产进度已推进"
        );
        Ok(production)
    }

    // ==========================================
    // 延期
    // ==========================================

    /// 阶段延期: 累加延期天数, 后续阶段窗口与预计完工时间同步后移
    ///
    /// # 参数
    /// - extra_days: 追加延期天数 (> 0)
    /// - reason: 延期原因
    #[instrument(skip(self, reason), fields(order_id = %order_id, stage = %stage_name, extra_days = %extra_days))]
    pub fn delay_stage(
        &self,
        order_id: &str,
        stage_name: &str,
        extra_days: f64,
        reason: &str,
    ) -> EngineResult<DelayOutcome> {
        if !(extra_days > 0.0 && extra_days <= MAX_DELAY_DAYS) {
            return Err(EngineError::InvalidArgument(format!(
                "延期天数必须位于 (0, {}]: {}",
                MAX_DELAY_DAYS, extra_days
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;

        let mut production = Self::require_open_production_tx(&tx, order_id)?;
        if !production.product_class.tracks_processes() {
            return Err(EngineError::NoProcessTracking(order_id.to_string()));
        }

        let mut processes = ProductionRepository::find_processes_tx(&tx, &production.production_id)?;
        let process = processes
            .iter_mut()
            .find(|p| p.process_name == stage_name)
            .ok_or_else(|| EngineError::StageNotFound(stage_name.to_string()))?;
        if process.status == ProcessStatus::Completed {
            return Err(EngineError::StageAlreadyCompleted(stage_name.to_string()));
        }

        if process.delay_days + extra_days > MAX_DELAY_DAYS {
            return Err(EngineError::InvalidArgument(format!(
                "阶段累计延期超过 {} 天: stage={}, delay_days={}",
                MAX_DELAY_DAYS, stage_name, process.delay_days
            )));
        }
        process.delay_days += extra_days;
        process.is_delayed = true;
        process.delay_reason = Some(reason.to_string());

        schedule::replan(production.production_started_at, &mut processes)?;
        production.estimated_completion_date = schedule::add_days(
            production.production_started_at,
            schedule::effective_cycle_days(&processes),
        )?;

        ProductionRepository::update_progress_tx(&tx, &production)?;
        ProductionRepository::update_processes_tx(&tx, &processes)?;
        tx.commit()?;

        tracing::info!(
            estimated_completion = %production.estimated_completion_date,
            reason = %reason,
            "阶段延期已登记"
        );

        Ok(DelayOutcome {
            production,
            processes,
            shifted_days: extra_days,
        })
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn build_processes(
        production_id: &str,
        table: &StageTable,
        started_at: DateTime<Utc>,
    ) -> EngineResult<Vec<ProductionProcess>> {
        let durations: Vec<f64> = table.stages().iter().map(|s| s.duration_days).collect();
        let windows = schedule::plan_windows(started_at, &durations)?;
        let processes = table
            .stages()
            .iter()
            .zip(windows)
            .enumerate()
            .map(|(idx, (stage, (start, end)))| ProductionProcess {
                process_id: Uuid::new_v4().to_string(),
                production_id: production_id.to_string(),
                process_name: stage.name.clone(),
                process_order: idx as i32 + 1,
                status: ProcessStatus::Pending,
                estimated_duration_days: stage.duration_days,
                delay_days: 0.0,
                planned_start_at: start,
                planned_end_at: end,
                started_at: None,
                completed_at: None,
                is_delayed: false,
                delay_reason: None,
            })
            .collect();
        Ok(processes)
    }

    /// 有效周期: 有工序时按工序 (含延期), 否则按阶段表
    fn cycle_days(table: &StageTable, processes: &[ProductionProcess]) -> f64 {
        if processes.is_empty() {
            table.total_cycle_days()
        } else {
            schedule::effective_cycle_days(processes)
        }
    }

    fn require_order_tx(conn: &Connection, order_id: &str) -> EngineResult<Order> {
        OrderRepository::find_by_id_tx(conn, order_id)?
            .ok_or_else(|| EngineError::UnknownOrder(order_id.to_string()))
    }

    /// 读取可变更的生产记录 (存在且未完成)
    fn require_open_production_tx(conn: &Connection, order_id: &str) -> EngineResult<Production> {
        let production = match ProductionRepository::find_by_order_tx(conn, order_id)? {
            Some(p) => p,
            None => {
                Self::require_order_tx(conn, order_id)?;
                return Err(EngineError::NoProduction(order_id.to_string()));
            }
        };
        if production.is_completed() {
            return Err(EngineError::ProductionCompleted(order_id.to_string()));
        }
        Ok(production)
    }
}
