// ==========================================
// 家具生产引擎 - 产品与物料清单领域模型
// ==========================================
// 职责: 产品目录、BOM 行、按数量展开
// 红线: BOM 运行期只读
// ==========================================

use crate::domain::types::ProductClass;
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 产品
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub product_class: ProductClass,
    /// 日产出入库对应的成品库存项 (仅连续生产品需要)
    pub finished_goods_material_id: Option<String>,
}

// ==========================================
// BomEntry - 物料清单行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomEntry {
    pub product_id: String,
    pub material_id: String,
    pub qty_per_unit: f64, // 单位产品耗用量 (>= 0)
    pub line_no: i32,      // 行号 (决定扣减顺序)
}

// ==========================================
// BillOfMaterials - 产品的完整物料清单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub product_id: String,
    pub lines: Vec<BomEntry>, // 按 line_no 升序
}

impl BillOfMaterials {
    pub fn new(product_id: impl Into<String>, mut lines: Vec<BomEntry>) -> Self {
        lines.sort_by_key(|l| l.line_no);
        Self {
            product_id: product_id.into(),
            lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 产生约束的行 (qty_per_unit > 0)
    pub fn constraining_lines(&self) -> impl Iterator<Item = &BomEntry> {
        self.lines.iter().filter(|l| l.qty_per_unit > 0.0)
    }

    /// 按生产数量展开需求: (material_id, 需求量)
    ///
    /// 耗用量为 0 的行不产生需求,直接跳过
    pub fn requirements_for(&self, units: f64) -> Vec<(String, f64)> {
        self.constraining_lines()
            .map(|l| (l.material_id.clone(), l.qty_per_unit * units))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(material_id: &str, qty: f64, line_no: i32) -> BomEntry {
        BomEntry {
            product_id: "P-CHAIR".to_string(),
            material_id: material_id.to_string(),
            qty_per_unit: qty,
            line_no,
        }
    }

    #[test]
    fn test_lines_are_ordered_by_line_no() {
        let bom = BillOfMaterials::new(
            "P-CHAIR",
            vec![entry("M-SCREW", 8.0, 3), entry("M-OAK", 2.5, 1), entry("M-GLUE", 0.1, 2)],
        );
        let ids: Vec<&str> = bom.lines.iter().map(|l| l.material_id.as_str()).collect();
        assert_eq!(ids, vec!["M-OAK", "M-GLUE", "M-SCREW"]);
    }

    #[test]
    fn test_requirements_skip_zero_lines() {
        let bom = BillOfMaterials::new("P-CHAIR", vec![entry("M-OAK", 2.0, 1), entry("M-TAG", 0.0, 2)]);
        let req = bom.requirements_for(10.0);
        assert_eq!(req, vec![("M-OAK".to_string(), 20.0)]);
    }
}
