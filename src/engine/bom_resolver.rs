// ==========================================
// 家具生产引擎 - BOM 解析
// ==========================================
// 职责: 读取产品的物料清单
// 红线: 只读, 不写任何表
// ==========================================

use crate::domain::product::BillOfMaterials;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::product_repo::ProductRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct BillOfMaterialsResolver {
    conn: Arc<Mutex<Connection>>,
}

impl BillOfMaterialsResolver {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 解析产品 BOM
    ///
    /// # 返回
    /// - 产品不存在: UnknownProduct
    /// - 产品存在但无 BOM: 空清单 (由调用方决定告警)
    pub fn resolve(&self, product_id: &str) -> EngineResult<BillOfMaterials> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::Lock(e.to_string()))?;
        Self::resolve_tx(&conn, product_id)
    }

    pub(crate) fn resolve_tx(conn: &Connection, product_id: &str) -> EngineResult<BillOfMaterials> {
        if ProductRepository::find_by_id_tx(conn, product_id)?.is_none() {
            return Err(EngineError::UnknownProduct(product_id.to_string()));
        }
        Ok(ProductRepository::find_bom_tx(conn, product_id)?)
    }
}
