// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、基础数据写入等功能
// ==========================================

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use furniture_production::db::{init_schema, open_sqlite_connection};
use furniture_production::domain::{BomEntry, InventoryItem, Order, Product, ProductClass};
use furniture_production::repository::{InventoryItemRepository, OrderRepository, ProductRepository};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接 (统一 PRAGMA)
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()))
}

/// 固定的测试基准时间
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

/// 基准时间之后若干天 (可为小数)
pub fn days_after(start: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    start + Duration::milliseconds((days * 86_400_000.0).round() as i64)
}

// ==========================================
// 基础数据
// ==========================================

/// 写入物料 (sku 与 material_id 相同)
pub fn seed_material(conn: &Arc<Mutex<Connection>>, material_id: &str, qty: f64, reorder_point: f64) {
    let item = InventoryItem::new(
        material_id,
        material_id,
        format!("物料 {}", material_id),
        "pcs",
        qty,
        0.0,
        reorder_point,
        0.0,
    );
    InventoryItemRepository::new(conn.clone()).insert(&item).unwrap();
}

/// 写入产品及其 BOM
pub fn seed_product(
    conn: &Arc<Mutex<Connection>>,
    product_id: &str,
    class: ProductClass,
    finished_goods_material_id: Option<&str>,
    bom: &[(&str, f64)],
) {
    let repo = ProductRepository::new(conn.clone());
    repo.upsert(&Product {
        product_id: product_id.to_string(),
        name: format!("产品 {}", product_id),
        product_class: class,
        finished_goods_material_id: finished_goods_material_id.map(str::to_string),
    })
    .unwrap();

    for (idx, (material_id, qty)) in bom.iter().enumerate() {
        repo.upsert_bom_entry(&BomEntry {
            product_id: product_id.to_string(),
            material_id: material_id.to_string(),
            qty_per_unit: *qty,
            line_no: idx as i32 + 1,
        })
        .unwrap();
    }
}

/// 写入待受理订单
pub fn seed_pending_order(
    conn: &Arc<Mutex<Connection>>,
    order_id: &str,
    product_id: &str,
    quantity: u32,
    created_at: DateTime<Utc>,
) -> Order {
    let order = Order::pending(order_id, product_id, quantity, created_at);
    OrderRepository::new(conn.clone()).insert(&order).unwrap();
    order
}

/// 写入已受理订单
pub fn seed_accepted_order(
    conn: &Arc<Mutex<Connection>>,
    order_id: &str,
    product_id: &str,
    quantity: u32,
    accepted_at: DateTime<Utc>,
) -> Order {
    seed_pending_order(conn, order_id, product_id, quantity, accepted_at);
    let repo = OrderRepository::new(conn.clone());
    repo.mark_accepted(order_id, accepted_at).unwrap();
    repo.find_by_id(order_id).unwrap().unwrap()
}

/// 读取物料当前在库量
pub fn on_hand(conn: &Arc<Mutex<Connection>>, material_id: &str) -> f64 {
    InventoryItemRepository::new(conn.clone())
        .find_by_id(material_id)
        .unwrap()
        .unwrap()
        .quantity_on_hand
}

/// 统计表行数
pub fn count_rows(conn: &Arc<Mutex<Connection>>, table: &str) -> i64 {
    let conn = conn.lock().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}
