// ==========================================
// 家具生产引擎 - 目录导入错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级数据问题不是错误, 以 RowViolation 形式收集
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("CSV 缺少必需列 (文件 {file}): {column}")]
    MissingColumn { file: String, column: String },

    // ===== 数据库错误 =====
    #[error("数据库写入失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("锁获取失败: {0}")]
    LockError(String),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Repository(RepositoryError::from(err))
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
