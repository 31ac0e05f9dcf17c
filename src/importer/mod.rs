// ==========================================
// 家具生产引擎 - 导入层
// ==========================================
// 职责: 从 CSV 导入物料、产品、BOM 目录
// 支持: materials.csv / products.csv / bom.csv
// ==========================================

pub mod catalog_importer;
pub mod error;

pub use catalog_importer::{CatalogImporter, ImportSummary, RowViolation};
pub use error::{ImportError, ImportResult};
