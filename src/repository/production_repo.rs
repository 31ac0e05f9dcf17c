// ==========================================
// 家具生产引擎 - 生产聚合数据仓储
// ==========================================
// 职责: production / production_process 两表的读写
// 红线: Repository 不含业务逻辑
// 红线: 写操作仅在引擎事务内进行
// ==========================================

use crate::domain::production::{Production, ProductionProcess};
use crate::domain::types::ProductionStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const PRODUCTION_COLUMNS: &str = r#"
    production_id, order_id, product_id, product_class, quantity,
    current_stage, status, overall_progress,
    production_started_at, estimated_completion_date, actual_completion_date
"#;

const PROCESS_COLUMNS: &str = r#"
    process_id, production_id, process_name, process_order, status,
    estimated_duration_days, delay_days,
    planned_start_at, planned_end_at, started_at, completed_at,
    is_delayed, delay_reason
"#;

pub struct ProductionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 只读查询
    // ==========================================

    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Option<Production>> {
        let conn = self.get_conn()?;
        Self::find_by_order_tx(&conn, order_id)
    }

    /// 按状态查询生产记录（None 表示全部）
    pub fn list(&self, status: Option<ProductionStatus>) -> RepositoryResult<Vec<Production>> {
        let conn = self.get_conn()?;
        Self::list_tx(&conn, status)
    }

    pub fn find_processes(&self, production_id: &str) -> RepositoryResult<Vec<ProductionProcess>> {
        let conn = self.get_conn()?;
        Self::find_processes_tx(&conn, production_id)
    }

    /// 订单的生产记录数（用于存在性校验, 期望 0 或 1）
    pub fn count_for_order(&self, order_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM production WHERE order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn find_by_order_tx(
        conn: &Connection,
        order_id: &str,
    ) -> RepositoryResult<Option<Production>> {
        let sql = format!("SELECT {} FROM production WHERE order_id = ?1", PRODUCTION_COLUMNS);
        let production = conn
            .query_row(&sql, params![order_id], Self::map_production)
            .optional()?;
        Ok(production)
    }

    pub(crate) fn list_tx(
        conn: &Connection,
        status: Option<ProductionStatus>,
    ) -> RepositoryResult<Vec<Production>> {
        let productions = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM production WHERE status = ?1 ORDER BY production_started_at, order_id",
                    PRODUCTION_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![status], Self::map_production)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM production ORDER BY production_started_at, order_id",
                    PRODUCTION_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], Self::map_production)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(productions)
    }

    pub(crate) fn insert_tx(conn: &Connection, production: &Production) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO production (
                production_id, order_id, product_id, product_class, quantity,
                current_stage, status, overall_progress,
                production_started_at, estimated_completion_date, actual_completion_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                production.production_id,
                production.order_id,
                production.product_id,
                production.product_class,
                production.quantity,
                production.current_stage,
                production.status,
                production.overall_progress,
                production.production_started_at,
                production.estimated_completion_date,
                production.actual_completion_date,
            ],
        )?;
        Ok(())
    }

    /// 更新进度/阶段/状态/时间（主键与归属字段不变）
    pub(crate) fn update_progress_tx(conn: &Connection, production: &Production) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE production
            SET current_stage = ?2, status = ?3, overall_progress = ?4,
                estimated_completion_date = ?5, actual_completion_date = ?6
            WHERE production_id = ?1
            "#,
            params![
                production.production_id,
                production.current_stage,
                production.status,
                production.overall_progress,
                production.estimated_completion_date,
                production.actual_completion_date,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Production".to_string(),
                id: production.production_id.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn insert_processes_tx(
        conn: &Connection,
        processes: &[ProductionProcess],
    ) -> RepositoryResult<usize> {
        if processes.is_empty() {
            return Ok(0);
        }

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO production_process (
                process_id, production_id, process_name, process_order, status,
                estimated_duration_days, delay_days,
                planned_start_at, planned_end_at, started_at, completed_at,
                is_delayed, delay_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )?;

        for p in processes {
            stmt.execute(params![
                p.process_id,
                p.production_id,
                p.process_name,
                p.process_order,
                p.status,
                p.estimated_duration_days,
                p.delay_days,
                p.planned_start_at,
                p.planned_end_at,
                p.started_at,
                p.completed_at,
                if p.is_delayed { 1 } else { 0 },
                p.delay_reason,
            ])?;
        }
        Ok(processes.len())
    }

    pub(crate) fn update_processes_tx(
        conn: &Connection,
        processes: &[ProductionProcess],
    ) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare(
            r#"
            UPDATE production_process
            SET status = ?2, delay_days = ?3,
                planned_start_at = ?4, planned_end_at = ?5,
                started_at = ?6, completed_at = ?7,
                is_delayed = ?8, delay_reason = ?9
            WHERE process_id = ?1
            "#,
        )?;

        let mut count = 0;
        for p in processes {
            count += stmt.execute(params![
                p.process_id,
                p.status,
                p.delay_days,
                p.planned_start_at,
                p.planned_end_at,
                p.started_at,
                p.completed_at,
                if p.is_delayed { 1 } else { 0 },
                p.delay_reason,
            ])?;
        }
        Ok(count)
    }

    pub(crate) fn find_processes_tx(
        conn: &Connection,
        production_id: &str,
    ) -> RepositoryResult<Vec<ProductionProcess>> {
        let sql = format!(
            "SELECT {} FROM production_process WHERE production_id = ?1 ORDER BY process_order ASC",
            PROCESS_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let processes = stmt
            .query_map(params![production_id], Self::map_process)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(processes)
    }

    fn map_production(row: &Row<'_>) -> SqliteResult<Production> {
        Ok(Production {
            production_id: row.get(0)?,
            order_id: row.get(1)?,
            product_id: row.get(2)?,
            product_class: row.get(3)?,
            quantity: row.get(4)?,
            current_stage: row.get(5)?,
            status: row.get(6)?,
            overall_progress: row.get(7)?,
            production_started_at: row.get(8)?,
            estimated_completion_date: row.get(9)?,
            actual_completion_date: row.get(10)?,
        })
    }

    fn map_process(row: &Row<'_>) -> SqliteResult<ProductionProcess> {
        Ok(ProductionProcess {
            process_id: row.get(0)?,
            production_id: row.get(1)?,
            process_name: row.get(2)?,
            process_order: row.get(3)?,
            status: row.get(4)?,
            estimated_duration_days: row.get(5)?,
            delay_days: row.get(6)?,
            planned_start_at: row.get(7)?,
            planned_end_at: row.get(8)?,
            started_at: row.get(9)?,
            completed_at: row.get(10)?,
            is_delayed: row.get::<_, i32>(11)? != 0,
            delay_reason: row.get(12)?,
        })
    }
}
