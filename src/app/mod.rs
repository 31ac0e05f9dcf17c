// ==========================================
// 家具生产引擎 - 应用层
// ==========================================
// 职责: 组装共享连接、配置快照与各 API 实例
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
