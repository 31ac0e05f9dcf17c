// ==========================================
// 家具生产引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config_trait::{ConfigResult, EngineConfigReader};
use crate::config::stage_definition::StageTable;
use crate::db::open_sqlite_connection;
use crate::domain::types::ProductClass;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 配置键
pub mod config_keys {
    pub const MIN_VISIBLE_PROGRESS_PCT: &str = "min_visible_progress_pct";
    pub const EFFICIENCY_CAP_PCT: &str = "efficiency_cap_pct";
    pub const STAGE_TABLE_PREFIX: &str = "stage_table/";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取数值配置, 解析失败时回退默认值
    fn get_f64_or_default(&self, key: &str, default: f64) -> ConfigResult<f64> {
        let value = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, "数值配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 获取所有 global 配置（用于审计/导出）
    pub fn get_config_snapshot(&self) -> ConfigResult<HashMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut config_map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }
}

// ==========================================
// EngineConfigReader Trait 实现
// ==========================================
#[async_trait]
impl EngineConfigReader for ConfigManager {
    async fn get_min_visible_progress_pct(&self) -> ConfigResult<f64> {
        let v = self.get_f64_or_default(config_keys::MIN_VISIBLE_PROGRESS_PCT, 5.0)?;
        Ok(v.clamp(0.0, 100.0))
    }

    async fn get_efficiency_cap_pct(&self) -> ConfigResult<f64> {
        let v = self.get_f64_or_default(config_keys::EFFICIENCY_CAP_PCT, 99.0)?;
        Ok(v.max(0.0))
    }

    async fn get_stage_table(&self, class: ProductClass) -> ConfigResult<StageTable> {
        let key = format!("{}{}", config_keys::STAGE_TABLE_PREFIX, class.as_str());
        let raw = match self.get_config_value(&key)? {
            Some(v) => v,
            None => return Ok(StageTable::default_for(class)),
        };

        match serde_json::from_str::<StageTable>(&raw) {
            Ok(table) => Ok(table),
            Err(e) => {
                tracing::warn!(
                    config_key = %key,
                    error = %e,
                    "阶段表配置非法，使用内置阶段表"
                );
                Ok(StageTable::default_for(class))
            }
        }
    }
}
