// ==========================================
// 家具生产引擎 - 库存项数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 数量写入只对 crate 内开放, 必须与派生状态同时写入
// ==========================================

use crate::domain::inventory::InventoryItem;
use crate::domain::types::StockStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    material_id, sku, name, unit,
    quantity_on_hand, baseline_quantity,
    safety_stock, reorder_point, max_level,
    status, updated_at
"#;

// ==========================================
// InventoryItemRepository - 库存项仓储
// ==========================================
pub struct InventoryItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryItemRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增库存项
    ///
    /// # 红线
    /// - 入参必须由 InventoryItem::new 构造（状态与数量一致）
    pub fn insert(&self, item: &InventoryItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, item)
    }

    /// 按主键查询
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<InventoryItem>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, material_id)
    }

    /// 查询全部库存项（按 material_id 排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<InventoryItem>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM inventory_item ORDER BY material_id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    /// 查询需要补货的库存项（status != in_stock）
    pub fn list_needing_reorder(&self) -> RepositoryResult<Vec<InventoryItem>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM inventory_item WHERE status <> ?1 ORDER BY quantity_on_hand ASC, material_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![StockStatus::InStock], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    // ==========================================
    // 事务内操作 (供引擎组合多表事务)
    // ==========================================

    pub(crate) fn insert_tx(conn: &Connection, item: &InventoryItem) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO inventory_item (
                material_id, sku, name, unit,
                quantity_on_hand, baseline_quantity,
                safety_stock, reorder_point, max_level,
                status, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                item.material_id,
                item.sku,
                item.name,
                item.unit,
                item.quantity_on_hand,
                item.baseline_quantity,
                item.safety_stock,
                item.reorder_point,
                item.max_level,
                item.status,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn find_by_id_tx(
        conn: &Connection,
        material_id: &str,
    ) -> RepositoryResult<Option<InventoryItem>> {
        let sql = format!("SELECT {} FROM inventory_item WHERE material_id = ?1", SELECT_COLUMNS);
        let item = conn
            .query_row(&sql, params![material_id], Self::map_row)
            .optional()?;
        Ok(item)
    }

    /// 写入新余额与派生状态
    ///
    /// # 红线
    /// - 仅 StockLedger 调用
    pub(crate) fn write_balance_tx(
        conn: &Connection,
        material_id: &str,
        quantity_on_hand: f64,
        status: StockStatus,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE inventory_item
            SET quantity_on_hand = ?2, status = ?3, updated_at = ?4
            WHERE material_id = ?1
            "#,
            params![material_id, quantity_on_hand, status, updated_at],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "InventoryItem".to_string(),
                id: material_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新主数据（名称/阈值）, 数量与基线保持不变
    ///
    /// # 说明
    /// - 再订货点变化会影响派生状态, 由调用方一并传入
    pub(crate) fn update_master_tx(
        conn: &Connection,
        item: &InventoryItem,
        status: StockStatus,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE inventory_item
            SET sku = ?2, name = ?3, unit = ?4,
                safety_stock = ?5, reorder_point = ?6, max_level = ?7,
                status = ?8, updated_at = ?9
            WHERE material_id = ?1
            "#,
            params![
                item.material_id,
                item.sku,
                item.name,
                item.unit,
                item.safety_stock,
                item.reorder_point,
                item.max_level,
                status,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<InventoryItem> {
        Ok(InventoryItem {
            material_id: row.get(0)?,
            sku: row.get(1)?,
            name: row.get(2)?,
            unit: row.get(3)?,
            quantity_on_hand: row.get(4)?,
            baseline_quantity: row.get(5)?,
            safety_stock: row.get(6)?,
            reorder_point: row.get(7)?,
            max_level: row.get(8)?,
            status: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}
