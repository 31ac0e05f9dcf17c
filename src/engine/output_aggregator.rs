// ==========================================
// 家具生产引擎 - 日产出聚合引擎
// ==========================================
// 职责: 连续生产品按日结算产出 → 扣减原料 → 成品入库 → 写入分析行
// 红线: 实际产出不超过原料可支撑的件数
// 红线: 同一产品同一天只结算一次, 重跑不重复扣减
// 红线: 单个产品一天的结算在一个事务内完成
// ==========================================

use crate::config::engine_config_trait::EngineConfig;
use crate::db::begin_immediate;
use crate::domain::ledger::{LedgerContext, ProductionAnalytics};
use crate::domain::types::LedgerSource;
use crate::engine::error::{EngineError, EngineResult, EngineWarning};
use crate::engine::stock_ledger::{DebitResult, StockLedger};
use crate::repository::analytics_repo::ProductionAnalyticsRepository;
use crate::repository::inventory_repo::InventoryItemRepository;
use crate::repository::product_repo::ProductRepository;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

/// 当日结算状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyOutputStatus {
    /// 按候选产出全额结算
    Recorded,
    /// 受原料约束, 按上限结算
    Capped,
    /// 原料不足以生产一件, 不写分析行
    ZeroOutput,
    SkippedMissingBom,
    SkippedAlreadyRecorded,
    SkippedNotContinuous,
}

impl DailyOutputStatus {
    /// 是否写入了分析行
    pub fn is_recorded(&self) -> bool {
        matches!(self, DailyOutputStatus::Recorded | DailyOutputStatus::Capped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOutputOutcome {
    pub product_id: String,
    pub date: NaiveDate,
    pub status: DailyOutputStatus,
    pub target_output: u64,
    /// None 表示 BOM 无约束行
    pub max_producible: Option<u64>,
    pub actual_output: u64,
    pub efficiency_percentage: Option<f64>,
    pub debits: Vec<DebitResult>,
    pub warnings: Vec<EngineWarning>,
}

impl DailyOutputOutcome {
    fn skipped(product_id: &str, date: NaiveDate, status: DailyOutputStatus, target: u64) -> Self {
        Self {
            product_id: product_id.to_string(),
            date,
            status,
            target_output: target,
            max_producible: None,
            actual_output: 0,
            efficiency_percentage: None,
            debits: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// 批量结算输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOutputInput {
    pub product_id: String,
    pub candidate_output: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutputReport {
    pub outcomes: Vec<DailyOutputOutcome>,
    pub failures: Vec<(String, String)>, // (product_id, 错误信息)
}

pub struct OutputAnalyticsAggregator {
    conn: Arc<Mutex<Connection>>,
    config: Arc<EngineConfig>,
}

impl OutputAnalyticsAggregator {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<EngineConfig>) -> Self {
        Self { conn, config }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Lock(e.to_string()))
    }

    /// 产出效率 (%) = min(上限, round(实际 / 目标 × 100, 2)); 目标为 0 时为 0
    pub fn efficiency_percentage(target_output: u64, actual_output: u64, cap_pct: f64) -> f64 {
        if target_output == 0 {
            return 0.0;
        }
        let raw = actual_output as f64 / target_output as f64 * 100.0;
        ((raw * 100.0).round() / 100.0).min(cap_pct)
    }

    /// 结算单个产品一天的产出
    ///
    /// # 参数
    /// - product_id: 连续生产品
    /// - date: 结算日
    /// - candidate_output: 外部给出的候选产出 (即当日目标)
    /// - now: 台账记录时间
    #[instrument(skip(self), fields(product_id = %product_id, date = %date, candidate = %candidate_output))]
    pub fn run_day(
        &self,
        product_id: &str,
        date: NaiveDate,
        candidate_output: u64,
        now: DateTime<Utc>,
    ) -> EngineResult<DailyOutputOutcome> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;
        let outcome = self.run_day_tx(&tx, product_id, date, candidate_output, now)?;
        tx.commit()?;

        tracing::info!(
            status = ?outcome.status,
            actual = outcome.actual_output,
            efficiency = ?outcome.efficiency_percentage,
            "日产出结算完成"
        );
        Ok(outcome)
    }

    /// 批量结算; 单个产品失败 (事务回滚) 不影响其他产品
    pub fn run_batch(
        &self,
        date: NaiveDate,
        inputs: &[DailyOutputInput],
        now: DateTime<Utc>,
    ) -> EngineResult<BatchOutputReport> {
        let mut report = BatchOutputReport::default();
        for input in inputs {
            match self.run_day(&input.product_id, date, input.candidate_output, now) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!(product_id = %input.product_id, error = %e, "日产出结算失败");
                    report.failures.push((input.product_id.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn run_day_tx(
        &self,
        conn: &Connection,
        product_id: &str,
        date: NaiveDate,
        candidate_output: u64,
        now: DateTime<Utc>,
    ) -> EngineResult<DailyOutputOutcome> {
        let product = ProductRepository::find_by_id_tx(conn, product_id)?
            .ok_or_else(|| EngineError::UnknownProduct(product_id.to_string()))?;

        if !product.product_class.is_continuously_produced() {
            tracing::debug!(class = %product.product_class, "非连续生产品, 跳过日产出结算");
            return Ok(DailyOutputOutcome::skipped(
                product_id,
                date,
                DailyOutputStatus::SkippedNotContinuous,
                candidate_output,
            ));
        }

        if ProductionAnalyticsRepository::find_tx(conn, date, product_id)?.is_some() {
            tracing::debug!("当日产出已结算, 跳过");
            let mut outcome = DailyOutputOutcome::skipped(
                product_id,
                date,
                DailyOutputStatus::SkippedAlreadyRecorded,
                candidate_output,
            );
            outcome.warnings.push(EngineWarning::AlreadyRecorded {
                product_id: product_id.to_string(),
            });
            return Ok(outcome);
        }

        let bom = ProductRepository::find_bom_tx(conn, product_id)?;
        if bom.is_empty() {
            tracing::warn!("产品没有 BOM, 跳过日产出结算");
            let mut outcome = DailyOutputOutcome::skipped(
                product_id,
                date,
                DailyOutputStatus::SkippedMissingBom,
                candidate_output,
            );
            outcome.warnings.push(EngineWarning::MissingBom {
                product_id: product_id.to_string(),
            });
            return Ok(outcome);
        }

        // ===== 原料约束 =====
        let material_ids: Vec<String> = bom.constraining_lines().map(|l| l.material_id.clone()).collect();
        let snapshot = StockLedger::snapshot_tx(conn, &material_ids)?;
        let max_producible = StockLedger::max_producible(&bom, &snapshot);
        let actual_output = match max_producible {
            Some(max) => candidate_output.min(max),
            None => candidate_output,
        };

        let mut outcome = DailyOutputOutcome {
            product_id: product_id.to_string(),
            date,
            status: DailyOutputStatus::ZeroOutput,
            target_output: candidate_output,
            max_producible,
            actual_output,
            efficiency_percentage: None,
            debits: Vec::new(),
            warnings: Vec::new(),
        };

        if actual_output == 0 {
            tracing::warn!(max_producible = ?max_producible, "当日产出为 0, 不写分析行");
            outcome.warnings.push(EngineWarning::ZeroOutput {
                product_id: product_id.to_string(),
            });
            return Ok(outcome);
        }

        // ===== 原料扣减 =====
        let usage_ctx = LedgerContext::new(
            date,
            LedgerSource::DailyProduction,
            Some(product_id.to_string()),
            now,
        );
        for (material_id, requested) in bom.requirements_for(actual_output as f64) {
            let debit = StockLedger::debit_tx(conn, &material_id, requested, &usage_ctx)?;
            if debit.is_short() {
                outcome.warnings.push(EngineWarning::InsufficientStock {
                    material_id: debit.material_id.clone(),
                    requested: debit.requested,
                    debited: debit.debited,
                });
            }
            outcome.debits.push(debit);
        }

        // ===== 成品入库 =====
        let finished_goods = match &product.finished_goods_material_id {
            Some(id) => InventoryItemRepository::find_by_id_tx(conn, id)?.map(|item| item.material_id),
            None => None,
        };
        match finished_goods {
            Some(material_id) => {
                let output_ctx = LedgerContext::new(
                    date,
                    LedgerSource::ProductionOutput,
                    Some(product_id.to_string()),
                    now,
                );
                StockLedger::credit_tx(conn, &material_id, actual_output as f64, &output_ctx)?;
            }
            None => {
                tracing::warn!("未配置成品库存项, 产出不入库");
                outcome.warnings.push(EngineWarning::MissingFinishedGoodsMaterial {
                    product_id: product_id.to_string(),
                });
            }
        }

        // ===== 分析行 =====
        let efficiency =
            Self::efficiency_percentage(candidate_output, actual_output, self.config.efficiency_cap_pct);
        ProductionAnalyticsRepository::insert_tx(
            conn,
            &ProductionAnalytics {
                analytics_date: date,
                product_id: product_id.to_string(),
                target_output: candidate_output,
                actual_output,
                efficiency_percentage: efficiency,
            },
        )?;

        outcome.efficiency_percentage = Some(efficiency);
        outcome.status = if actual_output < candidate_output {
            DailyOutputStatus::Capped
        } else {
            DailyOutputStatus::Recorded
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efficiency_rounds_to_two_decimals() {
        assert_eq!(OutputAnalyticsAggregator::efficiency_percentage(60, 50, 99.0), 83.33);
        assert_eq!(OutputAnalyticsAggregator::efficiency_percentage(3, 2, 99.0), 66.67);
    }

    #[test]
    fn test_efficiency_is_capped() {
        assert_eq!(OutputAnalyticsAggregator::efficiency_percentage(40, 40, 99.0), 99.0);
        assert_eq!(OutputAnalyticsAggregator::efficiency_percentage(200, 199, 99.0), 99.0);
    }

    #[test]
    fn test_efficiency_zero_target() {
        assert_eq!(OutputAnalyticsAggregator::efficiency_percentage(0, 0, 99.0), 0.0);
    }

    #[test]
    fn test_status_is_recorded() {
        assert!(DailyOutputStatus::Capped.is_recorded());
        assert!(!DailyOutputStatus::ZeroOutput.is_recorded());
        assert!(!DailyOutputStatus::SkippedAlreadyRecorded.is_recorded());
    }
}
