// ==========================================
// 家具生产引擎 - 产品与 BOM 数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::product::{BillOfMaterials, BomEntry, Product};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ProductRepository - 产品目录仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或更新产品
    pub fn upsert(&self, product: &Product) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_tx(&conn, product)
    }

    /// 新增或更新 BOM 行
    pub fn upsert_bom_entry(&self, entry: &BomEntry) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_bom_entry_tx(&conn, entry)
    }

    pub fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, product_id)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT product_id, name, product_class, finished_goods_material_id
            FROM product
            ORDER BY product_id
            "#,
        )?;
        let products = stmt
            .query_map([], Self::map_product)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(products)
    }

    /// 查询产品的物料清单（按 line_no 排序）
    pub fn find_bom(&self, product_id: &str) -> RepositoryResult<BillOfMaterials> {
        let conn = self.get_conn()?;
        Self::find_bom_tx(&conn, product_id)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn upsert_tx(conn: &Connection, product: &Product) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO product (product_id, name, product_class, finished_goods_material_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(product_id) DO UPDATE SET
                name = excluded.name,
                product_class = excluded.product_class,
                finished_goods_material_id = excluded.finished_goods_material_id
            "#,
            params![
                product.product_id,
                product.name,
                product.product_class,
                product.finished_goods_material_id,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn upsert_bom_entry_tx(conn: &Connection, entry: &BomEntry) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO bom_entry (product_id, material_id, qty_per_unit, line_no)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(product_id, material_id) DO UPDATE SET
                qty_per_unit = excluded.qty_per_unit,
                line_no = excluded.line_no
            "#,
            params![entry.product_id, entry.material_id, entry.qty_per_unit, entry.line_no],
        )?;
        Ok(())
    }

    pub(crate) fn find_by_id_tx(
        conn: &Connection,
        product_id: &str,
    ) -> RepositoryResult<Option<Product>> {
        let product = conn
            .query_row(
                r#"
                SELECT product_id, name, product_class, finished_goods_material_id
                FROM product
                WHERE product_id = ?1
                "#,
                params![product_id],
                Self::map_product,
            )
            .optional()?;
        Ok(product)
    }

    pub(crate) fn find_bom_tx(conn: &Connection, product_id: &str) -> RepositoryResult<BillOfMaterials> {
        let mut stmt = conn.prepare(
            r#"
            SELECT product_id, material_id, qty_per_unit, line_no
            FROM bom_entry
            WHERE product_id = ?1
            ORDER BY line_no ASC, material_id ASC
            "#,
        )?;
        let lines = stmt
            .query_map(params![product_id], |row| {
                Ok(BomEntry {
                    product_id: row.get(0)?,
                    material_id: row.get(1)?,
                    qty_per_unit: row.get(2)?,
                    line_no: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(BillOfMaterials::new(product_id, lines))
    }

    fn map_product(row: &Row<'_>) -> SqliteResult<Product> {
        Ok(Product {
            product_id: row.get(0)?,
            name: row.get(1)?,
            product_class: row.get(2)?,
            finished_goods_material_id: row.get(3)?,
        })
    }
}
