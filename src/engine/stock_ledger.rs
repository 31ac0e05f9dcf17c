// ==========================================
// 家具生产引擎 - 库存台账引擎
// ==========================================
// 职责: 库存扣减/入库的唯一物理变更入口
// 红线: quantity_on_hand 永不为负, 不足时按可用量截断, 不报错
// 红线: 数量与派生状态在同一条 UPDATE 中写入
// 红线: 每次实际变更 (> 0) 追加一条台账
// ==========================================

use crate::db::begin_immediate;
use crate::domain::inventory::{InventoryItem, StockSnapshot};
use crate::domain::ledger::LedgerContext;
use crate::domain::product::BillOfMaterials;
use crate::domain::types::{LedgerSource, StockStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::error::RepositoryError;
use crate::repository::inventory_repo::InventoryItemRepository;
use crate::repository::ledger_repo::InventoryLedgerRepository;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

/// 浮点比较容差 (数量单位)
const QTY_EPSILON: f64 = 1e-9;

// ==========================================
// DebitResult - 扣减结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebitResult {
    pub material_id: String,
    pub requested: f64,
    pub debited: f64,
    pub remaining: f64,
    pub status: StockStatus,
}

impl DebitResult {
    /// 是否被截断
    pub fn is_short(&self) -> bool {
        self.shortfall() > QTY_EPSILON
    }

    /// 短缺量 = 需求 - 实扣
    pub fn shortfall(&self) -> f64 {
        (self.requested - self.debited).max(0.0)
    }
}

// ==========================================
// CreditResult - 入库结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditResult {
    pub material_id: String,
    pub credited: f64,
    pub remaining: f64,
    pub status: StockStatus,
}

// ==========================================
// LedgerReconciliation - 台账回放对账
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReconciliation {
    pub material_id: String,
    pub baseline_quantity: f64,
    pub total_receipts: f64,
    pub total_usage: f64,
    /// baseline + Σ入库 - Σ耗用
    pub replayed_quantity: f64,
    pub quantity_on_hand: f64,
}

impl LedgerReconciliation {
    pub fn is_consistent(&self) -> bool {
        (self.replayed_quantity - self.quantity_on_hand).abs() <= 1e-6
    }

    pub fn discrepancy(&self) -> f64 {
        self.quantity_on_hand - self.replayed_quantity
    }
}

// ==========================================
// ReorderAlert - 补货提醒
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderAlert {
    pub material_id: String,
    pub name: String,
    pub quantity_on_hand: f64,
    pub reorder_point: f64,
    pub status: StockStatus,
    /// 建议补货量: 补至 max_level; 未设上限时补至再订货点
    pub suggested_quantity: f64,
}

// ==========================================
// StockLedger - 库存台账引擎
// ==========================================
pub struct StockLedger {
    conn: Arc<Mutex<Connection>>,
}

impl StockLedger {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Lock(e.to_string()))
    }

    // ==========================================
    // 只读查询
    // ==========================================

    /// 物料可用量 (未知物料视为 0)
    pub fn available_stock(&self, material_id: &str) -> EngineResult<f64> {
        let conn = self.get_conn()?;
        Self::available_stock_tx(&conn, material_id)
    }

    /// 读取一组物料的库存快照
    pub fn snapshot(&self, material_ids: &[String]) -> EngineResult<StockSnapshot> {
        let conn = self.get_conn()?;
        Self::snapshot_tx(&conn, material_ids)
    }

    /// 可生产件数上限 (纯函数)
    ///
    /// # 参数
    /// - bom: 产品物料清单
    /// - snapshot: material_id → 可用量
    ///
    /// # 返回
    /// - None: 清单中没有约束行 (所有行耗用 0), 不设上限
    /// - Some(n): 各约束行 floor(可用量 / 单耗) 的最小值; 快照中缺失的物料按 0 计
    pub fn max_producible(bom: &BillOfMaterials, snapshot: &StockSnapshot) -> Option<u64> {
        bom.constraining_lines()
            .map(|line| {
                let available = snapshot.get(&line.material_id).copied().unwrap_or(0.0).max(0.0);
                let units = (available / line.qty_per_unit + QTY_EPSILON).floor();
                if units.is_finite() && units > 0.0 {
                    units as u64
                } else {
                    0
                }
            })
            .min()
    }

    /// 派生库存状态 (纯函数)
    pub fn derive_status(item: &InventoryItem) -> StockStatus {
        StockStatus::derive(item.quantity_on_hand, item.reorder_point)
    }

    /// 补货提醒: 派生状态不为 in_stock 的物料
    pub fn reorder_alerts(&self) -> EngineResult<Vec<ReorderAlert>> {
        let items = InventoryItemRepository::new(self.conn.clone()).list_all()?;
        let mut alerts: Vec<ReorderAlert> = items
            .into_iter()
            .filter_map(|item| {
                let status = Self::derive_status(&item);
                if status == StockStatus::InStock {
                    return None;
                }
                let target = if item.max_level > 0.0 {
                    item.max_level
                } else {
                    item.reorder_point
                };
                Some(ReorderAlert {
                    suggested_quantity: (target - item.quantity_on_hand).max(0.0),
                    material_id: item.material_id,
                    name: item.name,
                    quantity_on_hand: item.quantity_on_hand,
                    reorder_point: item.reorder_point,
                    status,
                })
            })
            .collect();
        alerts.sort_by(|a, b| {
            a.quantity_on_hand
                .partial_cmp(&b.quantity_on_hand)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.material_id.cmp(&b.material_id))
        });
        Ok(alerts)
    }

    // ==========================================
    // 变更操作 (各自独立事务)
    // ==========================================

    /// 扣减库存
    ///
    /// # 参数
    /// - material_id: 物料
    /// - requested: 需求量 (>= 0)
    /// - ctx: 台账上下文
    ///
    /// # 返回
    /// - 实扣量 = min(需求, 可用); 不足不报错, 由 `is_short` 体现
    #[instrument(skip(self, ctx), fields(material_id = %material_id, requested = %requested))]
    pub fn debit(&self, material_id: &str, requested: f64, ctx: &LedgerContext) -> EngineResult<DebitResult> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;
        let result = Self::debit_tx(&tx, material_id, requested, ctx)?;
        tx.commit()?;
        Ok(result)
    }

    /// 入库 (扣减的逆操作)
    #[instrument(skip(self, ctx), fields(material_id = %material_id, qty = %qty))]
    pub fn credit(&self, material_id: &str, qty: f64, ctx: &LedgerContext) -> EngineResult<CreditResult> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;
        let result = Self::credit_tx(&tx, material_id, qty, ctx)?;
        tx.commit()?;
        Ok(result)
    }

    /// 采购补货入库
    pub fn restock(
        &self,
        material_id: &str,
        qty: f64,
        receipt_date: NaiveDate,
        reference_id: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<CreditResult> {
        let ctx = LedgerContext::new(receipt_date, LedgerSource::Restock, reference_id, now);
        self.credit(material_id, qty, &ctx)
    }

    /// 台账回放对账 (只读)
    pub fn replay_balance(&self, material_id: &str) -> EngineResult<LedgerReconciliation> {
        let conn = self.get_conn()?;
        Self::replay_balance_tx(&conn, material_id)
    }

    /// 按台账回放结果重建在库量
    ///
    /// # 说明
    /// - 回放结果为负时按 0 写入
    /// - 返回重建前的对账结果
    #[instrument(skip(self), fields(material_id = %material_id))]
    pub fn rebuild_balance(&self, material_id: &str, now: DateTime<Utc>) -> EngineResult<LedgerReconciliation> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;
        let before = Self::replay_balance_tx(&tx, material_id)?;

        if !before.is_consistent() {
            let item = Self::require_item_tx(&tx, material_id)?;
            let rebuilt = before.replayed_quantity.max(0.0);
            let status = StockStatus::derive(rebuilt, item.reorder_point);
            InventoryItemRepository::write_balance_tx(&tx, material_id, rebuilt, status, now)?;
            tracing::warn!(
                material_id = %material_id,
                on_hand = before.quantity_on_hand,
                replayed = before.replayed_quantity,
                "在库量与台账回放不一致, 已按台账重建"
            );
        }

        tx.commit()?;
        Ok(before)
    }

    // ==========================================
    // 事务内操作 (供其他引擎组合)
    // ==========================================

    pub(crate) fn available_stock_tx(conn: &Connection, material_id: &str) -> EngineResult<f64> {
        Ok(InventoryItemRepository::find_by_id_tx(conn, material_id)?
            .map(|item| item.quantity_on_hand.max(0.0))
            .unwrap_or(0.0))
    }

    pub(crate) fn snapshot_tx(conn: &Connection, material_ids: &[String]) -> EngineResult<StockSnapshot> {
        let mut snapshot = StockSnapshot::new();
        for material_id in material_ids {
            if let Some(item) = InventoryItemRepository::find_by_id_tx(conn, material_id)? {
                snapshot.insert(material_id.clone(), item.quantity_on_hand.max(0.0));
            }
        }
        Ok(snapshot)
    }

    pub(crate) fn debit_tx(
        conn: &Connection,
        material_id: &str,
        requested: f64,
        ctx: &LedgerContext,
    ) -> EngineResult<DebitResult> {
        if !requested.is_finite() || requested < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "扣减量必须为非负有限数: material_id={}, requested={}",
                material_id, requested
            )));
        }

        let Some(item) = InventoryItemRepository::find_by_id_tx(conn, material_id)? else {
            tracing::warn!(material_id = %material_id, requested, "物料不存在, 可用量按 0 处理");
            return Ok(DebitResult {
                material_id: material_id.to_string(),
                requested,
                debited: 0.0,
                remaining: 0.0,
                status: StockStatus::OutOfStock,
            });
        };

        let available = item.quantity_on_hand.max(0.0);
        let debited = requested.min(available);
        let mut remaining = available - debited;
        if remaining < QTY_EPSILON {
            remaining = 0.0;
        }
        let status = StockStatus::derive(remaining, item.reorder_point);

        if debited > 0.0 {
            InventoryItemRepository::write_balance_tx(conn, material_id, remaining, status, ctx.recorded_at)?;
            InventoryLedgerRepository::append_usage_tx(conn, material_id, debited, ctx)?;
        }

        let result = DebitResult {
            material_id: material_id.to_string(),
            requested,
            debited,
            remaining,
            status,
        };

        if result.is_short() {
            tracing::warn!(
                material_id = %material_id,
                requested,
                debited,
                shortfall = result.shortfall(),
                "库存不足, 扣减量已截断"
            );
        } else {
            tracing::debug!(material_id = %material_id, debited, remaining, "库存扣减");
        }

        Ok(result)
    }

    pub(crate) fn credit_tx(
        conn: &Connection,
        material_id: &str,
        qty: f64,
        ctx: &LedgerContext,
    ) -> EngineResult<CreditResult> {
        if !qty.is_finite() || qty < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "入库量必须为非负有限数: material_id={}, qty={}",
                material_id, qty
            )));
        }

        let item = Self::require_item_tx(conn, material_id)?;
        let remaining = item.quantity_on_hand.max(0.0) + qty;
        let status = StockStatus::derive(remaining, item.reorder_point);

        if qty > 0.0 {
            InventoryItemRepository::write_balance_tx(conn, material_id, remaining, status, ctx.recorded_at)?;
            InventoryLedgerRepository::append_receipt_tx(conn, material_id, qty, ctx)?;
            tracing::debug!(material_id = %material_id, credited = qty, remaining, "库存入库");
        }

        Ok(CreditResult {
            material_id: material_id.to_string(),
            credited: qty,
            remaining,
            status,
        })
    }

    pub(crate) fn replay_balance_tx(conn: &Connection, material_id: &str) -> EngineResult<LedgerReconciliation> {
        let item = Self::require_item_tx(conn, material_id)?;
        let total_receipts = InventoryLedgerRepository::total_receipts_tx(conn, material_id)?;
        let total_usage = InventoryLedgerRepository::total_usage_tx(conn, material_id)?;

        Ok(LedgerReconciliation {
            material_id: material_id.to_string(),
            baseline_quantity: item.baseline_quantity,
            total_receipts,
            total_usage,
            replayed_quantity: item.baseline_quantity + total_receipts - total_usage,
            quantity_on_hand: item.quantity_on_hand,
        })
    }

    fn require_item_tx(conn: &Connection, material_id: &str) -> EngineResult<InventoryItem> {
        InventoryItemRepository::find_by_id_tx(conn, material_id)?.ok_or_else(|| {
            EngineError::Repository(RepositoryError::NotFound {
                entity: "InventoryItem".to_string(),
                id: material_id.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::BomEntry;

    fn bom(lines: &[(&str, f64)]) -> BillOfMaterials {
        BillOfMaterials::new(
            "P-TABLE",
            lines
                .iter()
                .enumerate()
                .map(|(i, (m, q))| BomEntry {
                    product_id: "P-TABLE".to_string(),
                    material_id: m.to_string(),
                    qty_per_unit: *q,
                    line_no: i as i32 + 1,
                })
                .collect(),
        )
    }

    fn snapshot(entries: &[(&str, f64)]) -> StockSnapshot {
        entries.iter().map(|(m, q)| (m.to_string(), *q)).collect()
    }

    #[test]
    fn test_max_producible_takes_min_over_lines() {
        let bom = bom(&[("OAK", 2.0), ("SCREW", 8.0)]);
        let snap = snapshot(&[("OAK", 100.0), ("SCREW", 400.0)]);
        assert_eq!(StockLedger::max_producible(&bom, &snap), Some(50));
    }

    #[test]
    fn test_max_producible_floors_fractional_units() {
        let bom = bom(&[("OAK", 3.0)]);
        let snap = snapshot(&[("OAK", 10.0)]);
        assert_eq!(StockLedger::max_producible(&bom, &snap), Some(3));
    }

    #[test]
    fn test_max_producible_tolerates_float_noise() {
        let bom = bom(&[("VARNISH", 0.1)]);
        let snap = snapshot(&[("VARNISH", 0.3)]);
        assert_eq!(StockLedger::max_producible(&bom, &snap), Some(3));
    }

    #[test]
    fn test_max_producible_missing_material_is_zero() {
        let bom = bom(&[("OAK", 2.0), ("GLUE", 0.5)]);
        let snap = snapshot(&[("OAK", 100.0)]);
        assert_eq!(StockLedger::max_producible(&bom, &snap), Some(0));
    }

    #[test]
    fn test_max_producible_skips_zero_quantity_lines() {
        let bom = bom(&[("OAK", 2.0), ("LABEL", 0.0)]);
        let snap = snapshot(&[("OAK", 10.0)]);
        assert_eq!(StockLedger::max_producible(&bom, &snap), Some(5));

        let unconstrained = self::bom(&[("LABEL", 0.0)]);
        assert_eq!(StockLedger::max_producible(&unconstrained, &snap), None);
    }

    #[test]
    fn test_debit_result_shortfall() {
        let r = DebitResult {
            material_id: "OAK".to_string(),
            requested: 10.0,
            debited: 4.0,
            remaining: 0.0,
            status: StockStatus::OutOfStock,
        };
        assert!(r.is_short());
        assert_eq!(r.shortfall(), 6.0);
    }
}
