// ==========================================
// 家具生产引擎 - 出入库台账仓储
// ==========================================
// 红线: 台账只追加, 不提供更新/删除
// ==========================================

use crate::domain::ledger::{InventoryReceipt, InventoryUsage, LedgerContext};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct InventoryLedgerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryLedgerRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询物料在日期区间内的耗用台账（闭区间）
    pub fn list_usage(
        &self,
        material_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<InventoryUsage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT usage_id, material_id, usage_date, qty_used, source, reference_id, recorded_at
            FROM inventory_usage
            WHERE material_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3
            ORDER BY usage_date ASC, recorded_at ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![material_id, from, to], |row| {
                Ok(InventoryUsage {
                    usage_id: row.get(0)?,
                    material_id: row.get(1)?,
                    usage_date: row.get(2)?,
                    qty_used: row.get(3)?,
                    source: row.get(4)?,
                    reference_id: row.get(5)?,
                    recorded_at: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询某业务单据产生的全部耗用台账
    pub fn list_usage_by_reference(&self, reference_id: &str) -> RepositoryResult<Vec<InventoryUsage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT usage_id, material_id, usage_date, qty_used, source, reference_id, recorded_at
            FROM inventory_usage
            WHERE reference_id = ?1
            ORDER BY material_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![reference_id], |row| {
                Ok(InventoryUsage {
                    usage_id: row.get(0)?,
                    material_id: row.get(1)?,
                    usage_date: row.get(2)?,
                    qty_used: row.get(3)?,
                    source: row.get(4)?,
                    reference_id: row.get(5)?,
                    recorded_at: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询物料在日期区间内的入库台账（闭区间）
    pub fn list_receipts(
        &self,
        material_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<InventoryReceipt>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT receipt_id, material_id, receipt_date, qty_received, source, reference_id, recorded_at
            FROM inventory_receipt
            WHERE material_id = ?1 AND receipt_date >= ?2 AND receipt_date <= ?3
            ORDER BY receipt_date ASC, recorded_at ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![material_id, from, to], |row| {
                Ok(InventoryReceipt {
                    receipt_id: row.get(0)?,
                    material_id: row.get(1)?,
                    receipt_date: row.get(2)?,
                    qty_received: row.get(3)?,
                    source: row.get(4)?,
                    reference_id: row.get(5)?,
                    recorded_at: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn append_usage_tx(
        conn: &Connection,
        material_id: &str,
        qty_used: f64,
        ctx: &LedgerContext,
    ) -> RepositoryResult<InventoryUsage> {
        let usage = InventoryUsage {
            usage_id: Uuid::new_v4().to_string(),
            material_id: material_id.to_string(),
            usage_date: ctx.date,
            qty_used,
            source: ctx.source,
            reference_id: ctx.reference_id.clone(),
            recorded_at: ctx.recorded_at,
        };
        conn.execute(
            r#"
            INSERT INTO inventory_usage (
                usage_id, material_id, usage_date, qty_used, source, reference_id, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                usage.usage_id,
                usage.material_id,
                usage.usage_date,
                usage.qty_used,
                usage.source,
                usage.reference_id,
                usage.recorded_at,
            ],
        )?;
        Ok(usage)
    }

    pub(crate) fn append_receipt_tx(
        conn: &Connection,
        material_id: &str,
        qty_received: f64,
        ctx: &LedgerContext,
    ) -> RepositoryResult<InventoryReceipt> {
        let receipt = InventoryReceipt {
            receipt_id: Uuid::new_v4().to_string(),
            material_id: material_id.to_string(),
            receipt_date: ctx.date,
            qty_received,
            source: ctx.source,
            reference_id: ctx.reference_id.clone(),
            recorded_at: ctx.recorded_at,
        };
        conn.execute(
            r#"
            INSERT INTO inventory_receipt (
                receipt_id, material_id, receipt_date, qty_received, source, reference_id, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                receipt.receipt_id,
                receipt.material_id,
                receipt.receipt_date,
                receipt.qty_received,
                receipt.source,
                receipt.reference_id,
                receipt.recorded_at,
            ],
        )?;
        Ok(receipt)
    }

    /// 物料累计耗用
    pub(crate) fn total_usage_tx(conn: &Connection, material_id: &str) -> RepositoryResult<f64> {
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(qty_used), 0.0) FROM inventory_usage WHERE material_id = ?1",
            params![material_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 物料累计入库
    pub(crate) fn total_receipts_tx(conn: &Connection, material_id: &str) -> RepositoryResult<f64> {
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(qty_received), 0.0) FROM inventory_receipt WHERE material_id = ?1",
            params![material_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
