// ==========================================
// 家具生产引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout, 多连接并发写入时由 SQLite 锁串行化
// - 建表幂等, 可在任意已有库上重复执行
// ==========================================

use rusqlite::OptionalExtension;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 开启 IMMEDIATE 事务 (BEGIN 时即获取写锁)
///
/// 所有"读-改-写"库存与生产记录的操作都经由此入口, 保证可串行化
pub fn begin_immediate(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化全部业务表（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    match read_schema_version(conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema_version 高于当前代码版本"
            );
        }
        _ => {}
    }
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS inventory_item (
    material_id TEXT PRIMARY KEY,
    sku TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    unit TEXT NOT NULL DEFAULT 'pcs',
    quantity_on_hand REAL NOT NULL CHECK (quantity_on_hand >= 0),
    baseline_quantity REAL NOT NULL CHECK (baseline_quantity >= 0),
    safety_stock REAL NOT NULL DEFAULT 0,
    reorder_point REAL NOT NULL DEFAULT 0,
    max_level REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS product (
    product_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    product_class TEXT NOT NULL,
    finished_goods_material_id TEXT REFERENCES inventory_item(material_id)
);

CREATE TABLE IF NOT EXISTS bom_entry (
    product_id TEXT NOT NULL REFERENCES product(product_id) ON DELETE CASCADE,
    material_id TEXT NOT NULL REFERENCES inventory_item(material_id),
    qty_per_unit REAL NOT NULL CHECK (qty_per_unit >= 0),
    line_no INTEGER NOT NULL,
    PRIMARY KEY (product_id, material_id)
);

CREATE TABLE IF NOT EXISTS customer_order (
    order_id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL REFERENCES product(product_id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    acceptance_status TEXT NOT NULL,
    accepted_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS production (
    production_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL UNIQUE REFERENCES customer_order(order_id),
    product_id TEXT NOT NULL REFERENCES product(product_id),
    product_class TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    current_stage TEXT NOT NULL,
    status TEXT NOT NULL,
    overall_progress REAL NOT NULL CHECK (overall_progress >= 0 AND overall_progress <= 100),
    production_started_at TEXT NOT NULL,
    estimated_completion_date TEXT NOT NULL,
    actual_completion_date TEXT
);

CREATE TABLE IF NOT EXISTS production_process (
    process_id TEXT PRIMARY KEY,
    production_id TEXT NOT NULL REFERENCES production(production_id) ON DELETE CASCADE,
    process_name TEXT NOT NULL,
    process_order INTEGER NOT NULL,
    status TEXT NOT NULL,
    estimated_duration_days REAL NOT NULL,
    delay_days REAL NOT NULL DEFAULT 0,
    planned_start_at TEXT NOT NULL,
    planned_end_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    is_delayed INTEGER NOT NULL DEFAULT 0,
    delay_reason TEXT,
    UNIQUE (production_id, process_order)
);

CREATE TABLE IF NOT EXISTS order_tracking (
    order_id TEXT PRIMARY KEY REFERENCES customer_order(order_id),
    tracking_type TEXT NOT NULL,
    current_stage TEXT NOT NULL,
    status TEXT NOT NULL,
    progress_percentage REAL NOT NULL,
    process_timeline TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory_usage (
    usage_id TEXT PRIMARY KEY,
    material_id TEXT NOT NULL REFERENCES inventory_item(material_id),
    usage_date TEXT NOT NULL,
    qty_used REAL NOT NULL CHECK (qty_used > 0),
    source TEXT NOT NULL,
    reference_id TEXT,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_inventory_usage_material_date
    ON inventory_usage (material_id, usage_date);

CREATE TABLE IF NOT EXISTS inventory_receipt (
    receipt_id TEXT PRIMARY KEY,
    material_id TEXT NOT NULL REFERENCES inventory_item(material_id),
    receipt_date TEXT NOT NULL,
    qty_received REAL NOT NULL CHECK (qty_received > 0),
    source TEXT NOT NULL,
    reference_id TEXT,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_inventory_receipt_material_date
    ON inventory_receipt (material_id, receipt_date);

CREATE TABLE IF NOT EXISTS production_analytics (
    analytics_date TEXT NOT NULL,
    product_id TEXT NOT NULL REFERENCES product(product_id),
    target_output INTEGER NOT NULL,
    actual_output INTEGER NOT NULL,
    efficiency_percentage REAL NOT NULL,
    PRIMARY KEY (analytics_date, product_id)
);
"#;
