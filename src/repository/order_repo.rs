// ==========================================
// 家具生产引擎 - 订单数据仓储
// ==========================================
// 职责: 外部订单源写入订单及受理状态变更
// 红线: accepted 之后不可再拒绝 (生产已开始)
// ==========================================

use crate::domain::order::Order;
use crate::domain::types::AcceptanceStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增订单
    pub fn insert(&self, order: &Order) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO customer_order (
                order_id, product_id, quantity, acceptance_status, accepted_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                order.order_id,
                order.product_id,
                order.quantity,
                order.acceptance_status,
                order.accepted_at,
                order.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, order_id)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, product_id, quantity, acceptance_status, accepted_at, created_at
            FROM customer_order
            ORDER BY created_at ASC, order_id ASC
            "#,
        )?;
        let orders = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(orders)
    }

    /// 受理订单 (pending → accepted)
    ///
    /// # 说明
    /// - 已受理的订单重复受理为幂等操作, 保留首次受理时间
    pub fn mark_accepted(&self, order_id: &str, accepted_at: DateTime<Utc>) -> RepositoryResult<()> {
        self.transition(order_id, AcceptanceStatus::Accepted, Some(accepted_at))
    }

    /// 拒绝订单 (pending → rejected)
    pub fn mark_rejected(&self, order_id: &str) -> RepositoryResult<()> {
        self.transition(order_id, AcceptanceStatus::Rejected, None)
    }

    fn transition(
        &self,
        order_id: &str,
        target: AcceptanceStatus,
        accepted_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::transition_tx(&conn, order_id, target, accepted_at)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 事务内受理 (pending → accepted), 与生产记录建立同一事务提交
    pub(crate) fn mark_accepted_tx(
        conn: &Connection,
        order_id: &str,
        accepted_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        Self::transition_tx(conn, order_id, AcceptanceStatus::Accepted, Some(accepted_at))
    }

    fn transition_tx(
        conn: &Connection,
        order_id: &str,
        target: AcceptanceStatus,
        accepted_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let current = Self::find_by_id_tx(conn, order_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Order".to_string(),
            id: order_id.to_string(),
        })?;

        if current.acceptance_status == target {
            return Ok(());
        }
        if current.acceptance_status != AcceptanceStatus::Pending {
            return Err(RepositoryError::InvalidStateTransition {
                from: current.acceptance_status.to_string(),
                to: target.to_string(),
            });
        }

        conn.execute(
            "UPDATE customer_order SET acceptance_status = ?2, accepted_at = ?3 WHERE order_id = ?1",
            params![order_id, target, accepted_at],
        )?;
        Ok(())
    }

    pub(crate) fn find_by_id_tx(conn: &Connection, order_id: &str) -> RepositoryResult<Option<Order>> {
        let order = conn
            .query_row(
                r#"
                SELECT order_id, product_id, quantity, acceptance_status, accepted_at, created_at
                FROM customer_order
                WHERE order_id = ?1
                "#,
                params![order_id],
                Self::map_row,
            )
            .optional()?;
        Ok(order)
    }

    pub(crate) fn list_ids_tx(conn: &Connection) -> RepositoryResult<Vec<String>> {
        let mut stmt = conn.prepare("SELECT order_id FROM customer_order ORDER BY order_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(ids)
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Order> {
        Ok(Order {
            order_id: row.get(0)?,
            product_id: row.get(1)?,
            quantity: row.get(2)?,
            acceptance_status: row.get(3)?,
            accepted_at: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
