// ==========================================
// 家具生产引擎 - 订单跟踪投影仓储
// ==========================================
// 红线: 写入仅限 TrackingSynchronizer (crate 内可见)
// 说明: process_timeline 以 JSON 文本存储
// ==========================================

use crate::domain::tracking::{OrderTracking, TimelineEntry};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct OrderTrackingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderTrackingRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Option<OrderTracking>> {
        let conn = self.get_conn()?;
        Self::find_by_order_tx(&conn, order_id)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<OrderTracking>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, tracking_type, current_stage, status, progress_percentage, process_timeline
            FROM order_tracking
            ORDER BY order_id
            "#,
        )?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 读取原始存储文本（用于逐字节一致性校验）
    pub fn find_raw_by_order(&self, order_id: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT tracking_type || '|' || current_stage || '|' || status || '|'
                       || quote(progress_percentage) || '|' || process_timeline
                FROM order_tracking
                WHERE order_id = ?1
                "#,
                params![order_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(raw)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn find_by_order_tx(
        conn: &Connection,
        order_id: &str,
    ) -> RepositoryResult<Option<OrderTracking>> {
        let tracking = conn
            .query_row(
                r#"
                SELECT order_id, tracking_type, current_stage, status, progress_percentage, process_timeline
                FROM order_tracking
                WHERE order_id = ?1
                "#,
                params![order_id],
                Self::map_row,
            )
            .optional()?;
        Ok(tracking)
    }

    /// 覆盖写入跟踪投影
    pub(crate) fn upsert_tx(conn: &Connection, tracking: &OrderTracking) -> RepositoryResult<()> {
        let timeline = serde_json::to_string(&tracking.process_timeline)?;
        conn.execute(
            r#"
            INSERT INTO order_tracking (
                order_id, tracking_type, current_stage, status, progress_percentage, process_timeline
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(order_id) DO UPDATE SET
                tracking_type = excluded.tracking_type,
                current_stage = excluded.current_stage,
                status = excluded.status,
                progress_percentage = excluded.progress_percentage,
                process_timeline = excluded.process_timeline
            "#,
            params![
                tracking.order_id,
                tracking.tracking_type,
                tracking.current_stage,
                tracking.status,
                tracking.progress_percentage,
                timeline,
            ],
        )?;
        Ok(())
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<OrderTracking> {
        let raw_timeline: String = row.get(5)?;
        let process_timeline: Vec<TimelineEntry> = serde_json::from_str(&raw_timeline)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(OrderTracking {
            order_id: row.get(0)?,
            tracking_type: row.get(1)?,
            current_stage: row.get(2)?,
            status: row.get(3)?,
            progress_percentage: row.get(4)?,
            process_timeline,
        })
    }
}
