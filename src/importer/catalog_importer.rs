// ==========================================
// 家具生产引擎 - 目录导入器
// ==========================================
// 职责: CSV → 库存项 / 产品 / BOM
// 流程: 读取表头 → 逐行校验 → 合法行写库, 非法行收集为 RowViolation
// 红线: 产品分类必须显式给出, 不从名称推断
// 红线: 已存在的库存项只更新主数据, 不覆盖在库量与基线 (由台账维护)
// ==========================================

use crate::db::begin_immediate;
use crate::domain::inventory::InventoryItem;
use crate::domain::product::{BomEntry, Product};
use crate::domain::types::ProductClass;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::inventory_repo::InventoryItemRepository;
use crate::repository::product_repo::ProductRepository;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub const MATERIALS_FILE: &str = "materials.csv";
pub const PRODUCTS_FILE: &str = "products.csv";
pub const BOM_FILE: &str = "bom.csv";

// ==========================================
// 行级违规与导入汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowViolation {
    pub file: String,
    pub row: usize, // 文件行号 (表头为第 1 行)
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub materials_inserted: usize,
    pub materials_updated: usize,
    pub products_upserted: usize,
    pub bom_lines_upserted: usize,
    pub violations: Vec<RowViolation>,
}

impl ImportSummary {
    pub fn merge(&mut self, other: ImportSummary) {
        self.materials_inserted += other.materials_inserted;
        self.materials_updated += other.materials_updated;
        self.products_upserted += other.products_upserted;
        self.bom_lines_upserted += other.bom_lines_upserted;
        self.violations.extend(other.violations);
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

// ==========================================
// CSV 原始行
// ==========================================
#[derive(Debug, Deserialize)]
struct MaterialRow {
    material_id: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    name: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    quantity_on_hand: Option<String>,
    #[serde(default)]
    safety_stock: Option<String>,
    #[serde(default)]
    reorder_point: Option<String>,
    #[serde(default)]
    max_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    product_id: Option<String>,
    name: Option<String>,
    product_class: Option<String>,
    #[serde(default)]
    finished_goods_material_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BomRow {
    product_id: Option<String>,
    material_id: Option<String>,
    qty_per_unit: Option<String>,
    #[serde(default)]
    line_no: Option<String>,
}

// ==========================================
// CatalogImporter
// ==========================================
pub struct CatalogImporter {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogImporter {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> ImportResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))
    }

    /// 导入目录下的全部目录文件 (物料 → 产品 → BOM)
    ///
    /// # 说明
    /// - 缺失的文件跳过并记录日志
    pub fn import_dir(&self, dir: &Path, now: DateTime<Utc>) -> ImportResult<ImportSummary> {
        if !dir.is_dir() {
            return Err(ImportError::FileNotFound(dir.display().to_string()));
        }

        let mut summary = ImportSummary::default();
        let materials = dir.join(MATERIALS_FILE);
        if materials.exists() {
            summary.merge(self.import_materials(&materials, now)?);
        } else {
            tracing::info!(path = %materials.display(), "物料文件不存在, 跳过");
        }

        let products = dir.join(PRODUCTS_FILE);
        if products.exists() {
            summary.merge(self.import_products(&products)?);
        } else {
            tracing::info!(path = %products.display(), "产品文件不存在, 跳过");
        }

        let bom = dir.join(BOM_FILE);
        if bom.exists() {
            summary.merge(self.import_bom(&bom)?);
        } else {
            tracing::info!(path = %bom.display(), "BOM 文件不存在, 跳过");
        }

        tracing::info!(
            materials_inserted = summary.materials_inserted,
            materials_updated = summary.materials_updated,
            products = summary.products_upserted,
            bom_lines = summary.bom_lines_upserted,
            violations = summary.violations.len(),
            "目录导入完成"
        );
        Ok(summary)
    }

    /// 导入库存项
    ///
    /// 必需列: material_id, name, quantity_on_hand
    pub fn import_materials(&self, path: &Path, now: DateTime<Utc>) -> ImportResult<ImportSummary> {
        let file = file_label(path);
        let rows: Vec<(usize, Result<MaterialRow, csv::Error>)> =
            read_rows(path, &["material_id", "name", "quantity_on_hand"])?;

        let mut summary = ImportSummary::default();
        let mut seen = HashSet::new();
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;

        for (row_no, parsed) in rows {
            let mut v = Violations::new(&file, row_no);
            let row = match parsed {
                Ok(r) => r,
                Err(e) => {
                    v.push("-", e.to_string());
                    summary.violations.extend(v.into_inner());
                    continue;
                }
            };

            let material_id = v.required("material_id", row.material_id);
            let name = v.required("name", row.name);
            let quantity = v.non_negative("quantity_on_hand", row.quantity_on_hand, None);
            let safety_stock = v.non_negative("safety_stock", row.safety_stock, Some(0.0));
            let reorder_point = v.non_negative("reorder_point", row.reorder_point, Some(0.0));
            let max_level = v.non_negative("max_level", row.max_level, Some(0.0));

            if let Some(id) = &material_id {
                if !seen.insert(id.clone()) {
                    v.push("material_id", format!("文件内重复: {}", id));
                }
            }

            let (Some(material_id), Some(name), Some(quantity), Some(safety_stock), Some(reorder_point), Some(max_level)) =
                (material_id, name, quantity, safety_stock, reorder_point, max_level)
            else {
                summary.violations.extend(v.into_inner());
                continue;
            };
            if !v.is_empty() {
                summary.violations.extend(v.into_inner());
                continue;
            }

            let sku = non_empty(row.sku).unwrap_or_else(|| material_id.clone());
            let unit = non_empty(row.unit).unwrap_or_else(|| "pcs".to_string());
            let mut item = InventoryItem::new(
                material_id, sku, name, unit, quantity, safety_stock, reorder_point, max_level,
            );
            item.updated_at = now;

            match InventoryItemRepository::find_by_id_tx(&tx, &item.material_id)? {
                Some(existing) => {
                    item.quantity_on_hand = existing.quantity_on_hand;
                    let status = item.derived_status();
                    InventoryItemRepository::update_master_tx(&tx, &item, status)?;
                    summary.materials_updated += 1;
                }
                None => {
                    InventoryItemRepository::insert_tx(&tx, &item)?;
                    summary.materials_inserted += 1;
                }
            }
        }

        tx.commit()?;
        log_file_summary(&file, &summary);
        Ok(summary)
    }

    /// 导入产品
    ///
    /// 必需列: product_id, name, product_class
    pub fn import_products(&self, path: &Path) -> ImportResult<ImportSummary> {
        let file = file_label(path);
        let rows: Vec<(usize, Result<ProductRow, csv::Error>)> =
            read_rows(path, &["product_id", "name", "product_class"])?;

        let mut summary = ImportSummary::default();
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;

        for (row_no, parsed) in rows {
            let mut v = Violations::new(&file, row_no);
            let row = match parsed {
                Ok(r) => r,
                Err(e) => {
                    v.push("-", e.to_string());
                    summary.violations.extend(v.into_inner());
                    continue;
                }
            };

            let product_id = v.required("product_id", row.product_id);
            let name = v.required("name", row.name);
            let product_class = v.required("product_class", row.product_class).and_then(|raw| {
                let parsed = ProductClass::from_db_str(&raw);
                if parsed.is_none() {
                    v.push("product_class", format!("未知分类: {}", raw));
                }
                parsed
            });

            let finished_goods_material_id = non_empty(row.finished_goods_material_id);
            if let Some(fg) = &finished_goods_material_id {
                if InventoryItemRepository::find_by_id_tx(&tx, fg)?.is_none() {
                    v.push("finished_goods_material_id", format!("库存项不存在: {}", fg));
                }
            }

            let (Some(product_id), Some(name), Some(product_class)) = (product_id, name, product_class) else {
                summary.violations.extend(v.into_inner());
                continue;
            };
            if !v.is_empty() {
                summary.violations.extend(v.into_inner());
                continue;
            }

            ProductRepository::upsert_tx(
                &tx,
                &Product {
                    product_id,
                    name,
                    product_class,
                    finished_goods_material_id,
                },
            )?;
            summary.products_upserted += 1;
        }

        tx.commit()?;
        log_file_summary(&file, &summary);
        Ok(summary)
    }

    /// 导入 BOM 行
    ///
    /// 必需列: product_id, material_id, qty_per_unit; line_no 缺省时按文件顺序编号
    pub fn import_bom(&self, path: &Path) -> ImportResult<ImportSummary> {
        let file = file_label(path);
        let rows: Vec<(usize, Result<BomRow, csv::Error>)> =
            read_rows(path, &["product_id", "material_id", "qty_per_unit"])?;

        let mut summary = ImportSummary::default();
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;

        for (row_no, parsed) in rows {
            let mut v = Violations::new(&file, row_no);
            let row = match parsed {
                Ok(r) => r,
                Err(e) => {
                    v.push("-", e.to_string());
                    summary.violations.extend(v.into_inner());
                    continue;
                }
            };

            let product_id = v.required("product_id", row.product_id);
            let material_id = v.required("material_id", row.material_id);
            let qty_per_unit = v.non_negative("qty_per_unit", row.qty_per_unit, None);
            let line_no = match non_empty(row.line_no) {
                Some(raw) => match raw.parse::<i32>() {
                    Ok(n) => Some(n),
                    Err(_) => {
                        v.push("line_no", format!("不是整数: {}", raw));
                        None
                    }
                },
                None => Some(row_no as i32 - 1),
            };

            if let Some(pid) = &product_id {
                if ProductRepository::find_by_id_tx(&tx, pid)?.is_none() {
                    v.push("product_id", format!("产品不存在: {}", pid));
                }
            }
            if let Some(mid) = &material_id {
                if InventoryItemRepository::find_by_id_tx(&tx, mid)?.is_none() {
                    v.push("material_id", format!("库存项不存在: {}", mid));
                }
            }

            let (Some(product_id), Some(material_id), Some(qty_per_unit), Some(line_no)) =
                (product_id, material_id, qty_per_unit, line_no)
            else {
                summary.violations.extend(v.into_inner());
                continue;
            };
            if !v.is_empty() {
                summary.violations.extend(v.into_inner());
                continue;
            }

            ProductRepository::upsert_bom_entry_tx(
                &tx,
                &BomEntry {
                    product_id,
                    material_id,
                    qty_per_unit,
                    line_no,
                },
            )?;
            summary.bom_lines_upserted += 1;
        }

        tx.commit()?;
        log_file_summary(&file, &summary);
        Ok(summary)
    }
}

// ==========================================
// 内部工具
// ==========================================

/// 读取 CSV 并逐行反序列化; 返回 (文件行号, 解析结果)
fn read_rows<T: DeserializeOwned>(
    path: &Path,
    required_columns: &[&str],
) -> ImportResult<Vec<(usize, Result<T, csv::Error>)>> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    for column in required_columns {
        if !headers.iter().any(|h| h == *column) {
            return Err(ImportError::MissingColumn {
                file: file_label(path),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        rows.push((idx + 2, record.deserialize::<T>(Some(&headers))));
    }
    Ok(rows)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn log_file_summary(file: &str, summary: &ImportSummary) {
    if summary.violations.is_empty() {
        tracing::debug!(file = %file, "文件导入完成");
    } else {
        tracing::warn!(file = %file, violations = summary.violations.len(), "文件导入存在非法行");
    }
}

/// 单行违规收集器
struct Violations {
    file: String,
    row: usize,
    items: Vec<RowViolation>,
}

impl Violations {
    fn new(file: &str, row: usize) -> Self {
        Self {
            file: file.to_string(),
            row,
            items: Vec::new(),
        }
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.items.push(RowViolation {
            file: self.file.clone(),
            row: self.row,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn required(&mut self, field: &str, value: Option<String>) -> Option<String> {
        let value = non_empty(value);
        if value.is_none() {
            self.push(field, "必填字段为空");
        }
        value
    }

    /// 解析非负数; 缺省时使用 default (None 表示必填)
    fn non_negative(&mut self, field: &str, value: Option<String>, default: Option<f64>) -> Option<f64> {
        let Some(raw) = non_empty(value) else {
            if default.is_none() {
                self.push(field, "必填字段为空");
            }
            return default;
        };
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => Some(n),
            Ok(n) => {
                self.push(field, format!("必须为非负数: {}", n));
                None
            }
            Err(_) => {
                self.push(field, format!("不是数值: {}", raw));
                None
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn into_inner(self) -> Vec<RowViolation> {
        self.items
    }
}
