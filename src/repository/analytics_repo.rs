// ==========================================
// 家具生产引擎 - 日产出分析仓储
// ==========================================
// 红线: 每个产品每个自然日最多一行
// ==========================================

use crate::domain::ledger::ProductionAnalytics;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct ProductionAnalyticsRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionAnalyticsRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find(&self, date: NaiveDate, product_id: &str) -> RepositoryResult<Option<ProductionAnalytics>> {
        let conn = self.get_conn()?;
        Self::find_tx(&conn, date, product_id)
    }

    /// 查询产品在日期区间内的分析记录（闭区间）
    pub fn list_by_product(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<ProductionAnalytics>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT analytics_date, product_id, target_output, actual_output, efficiency_percentage
            FROM production_analytics
            WHERE product_id = ?1 AND analytics_date >= ?2 AND analytics_date <= ?3
            ORDER BY analytics_date ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![product_id, from, to], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询某日全部产品的分析记录
    pub fn list_by_date(&self, date: NaiveDate) -> RepositoryResult<Vec<ProductionAnalytics>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT analytics_date, product_id, target_output, actual_output, efficiency_percentage
            FROM production_analytics
            WHERE analytics_date = ?1
            ORDER BY product_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![date], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn find_tx(
        conn: &Connection,
        date: NaiveDate,
        product_id: &str,
    ) -> RepositoryResult<Option<ProductionAnalytics>> {
        let row = conn
            .query_row(
                r#"
                SELECT analytics_date, product_id, target_output, actual_output, efficiency_percentage
                FROM production_analytics
                WHERE analytics_date = ?1 AND product_id = ?2
                "#,
                params![date, product_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    pub(crate) fn insert_tx(conn: &Connection, analytics: &ProductionAnalytics) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO production_analytics (
                analytics_date, product_id, target_output, actual_output, efficiency_percentage
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                analytics.analytics_date,
                analytics.product_id,
                analytics.target_output as i64,
                analytics.actual_output as i64,
                analytics.efficiency_percentage,
            ],
        )?;
        Ok(())
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<ProductionAnalytics> {
        Ok(ProductionAnalytics {
            analytics_date: row.get(0)?,
            product_id: row.get(1)?,
            target_output: row.get::<_, i64>(2)?.max(0) as u64,
            actual_output: row.get::<_, i64>(3)?.max(0) as u64,
            efficiency_percentage: row.get(4)?,
        })
    }
}
