// ==========================================
// 家具生产引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ProductionApi, ReportApi};
use crate::config::{ConfigManager, EngineConfig, EngineConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{OutputAnalyticsAggregator, ProductionScheduler, StockLedger, TrackingSynchronizer};
use crate::importer::CatalogImporter;
use crate::repository::{
    InventoryItemRepository, InventoryLedgerRepository, OrderRepository, OrderTrackingRepository,
    ProductRepository, ProductionAnalyticsRepository, ProductionRepository,
};
use rusqlite::Connection;

/// 应用状态
///
/// 所有组件共享同一个连接; 引擎配置在启动时加载一次
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 引擎配置快照
    pub config: Arc<EngineConfig>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 生产操作API
    pub production_api: Arc<ProductionApi>,

    /// 只读报表API
    pub report_api: Arc<ReportApi>,

    /// 目录导入器
    pub catalog_importer: Arc<CatalogImporter>,

    /// 订单仓储 (订单源写入)
    pub order_repo: Arc<OrderRepository>,

    /// 产品仓储
    pub product_repo: Arc<ProductRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表（幂等）
    /// 2. 从 config_kv 加载引擎配置
    /// 3. 初始化所有Repository、Engine与API实例
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = Arc::new(
            config_manager
                .load_engine_config()
                .await
                .map_err(|e| format!("加载引擎配置失败: {}", e))?,
        );

        Ok(Self::assemble(db_path, conn, config, config_manager))
    }

    /// 用已有连接与配置组装 (测试或嵌入场景)
    pub fn with_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        config: EngineConfig,
    ) -> Result<Self, String> {
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        Ok(Self::assemble(db_path, conn, Arc::new(config), config_manager))
    }

    fn assemble(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        config: Arc<EngineConfig>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let product_repo = Arc::new(ProductRepository::new(conn.clone()));
        let production_repo = Arc::new(ProductionRepository::new(conn.clone()));
        let tracking_repo = Arc::new(OrderTrackingRepository::new(conn.clone()));
        let inventory_repo = Arc::new(InventoryItemRepository::new(conn.clone()));
        let ledger_repo = Arc::new(InventoryLedgerRepository::new(conn.clone()));
        let analytics_repo = Arc::new(ProductionAnalyticsRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let ledger = Arc::new(StockLedger::new(conn.clone()));
        let scheduler = Arc::new(ProductionScheduler::new(conn.clone(), config.clone()));
        let tracking = Arc::new(TrackingSynchronizer::new(conn.clone(), config.clone()));
        let aggregator = Arc::new(OutputAnalyticsAggregator::new(conn.clone(), config.clone()));

        // ==========================================
        // 创建API实例
        // ==========================================
        let production_api = Arc::new(ProductionApi::new(
            order_repo.clone(),
            scheduler,
            tracking.clone(),
            aggregator,
            ledger.clone(),
        ));
        let report_api = Arc::new(ReportApi::new(
            production_repo,
            tracking_repo,
            inventory_repo,
            ledger_repo,
            analytics_repo,
            ledger,
            tracking,
        ));
        let catalog_importer = Arc::new(CatalogImporter::new(conn.clone()));

        tracing::info!("AppState初始化完成");

        Self {
            db_path,
            conn,
            config,
            config_manager,
            production_api,
            report_api,
            catalog_importer,
            order_repo,
            product_repo,
        }
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 FURNITURE_PRODUCTION_DB_PATH 优先
/// - 开发环境: 用户数据目录/furniture-production-dev/furniture_production.db
/// - 生产环境: 用户数据目录/furniture-production/furniture_production.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("FURNITURE_PRODUCTION_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./furniture_production.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("furniture-production-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("furniture-production");
        }

        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(path = %path.display(), error = %e, "数据目录创建失败, 使用当前目录");
            return "./furniture_production.db".to_string();
        }
        path = path.join("furniture_production.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }
}
