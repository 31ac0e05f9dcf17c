// ==========================================
// 家具生产引擎 - 配置层
// ==========================================
// 职责: 系统配置管理与阶段表定义
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config_trait;
pub mod stage_definition;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use engine_config_trait::{ConfigResult, EngineConfig, EngineConfigReader};
pub use stage_definition::{StageCatalog, StageDefinition, StageTable, StageTableError};
