// ==========================================
// 家具生产引擎 - 工序阶段定义
// ==========================================
// 职责: 按产品分类维护唯一的阶段表 (阈值 + 工期)
// 红线: 调度器与跟踪同步共用同一张表,不得各自重复声明
// ==========================================

use crate::domain::types::ProductClass;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单个阶段定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    /// 累计进度阈值 (%), 进度 >= 阈值即视为到达该阶段
    pub threshold_pct: f64,
    /// 分配工期 (天)
    pub duration_days: f64,
}

impl StageDefinition {
    pub fn new(name: impl Into<String>, threshold_pct: f64, duration_days: f64) -> Self {
        Self {
            name: name.into(),
            threshold_pct,
            duration_days,
        }
    }
}

/// 单阶段工期上限 (天)
pub const MAX_STAGE_DURATION_DAYS: f64 = 3650.0;

/// 阶段表校验错误
#[derive(Error, Debug, PartialEq)]
pub enum StageTableError {
    #[error("阶段表为空")]
    Empty,

    #[error("阶段名重复: {0}")]
    DuplicateStage(String),

    #[error("阶段阈值必须严格递增且位于 (0, 100]: stage={stage}, threshold={threshold}")]
    InvalidThreshold { stage: String, threshold: f64 },

    #[error("最后一个阶段阈值必须为 100, 实际为 {0}")]
    LastThresholdNot100(f64),

    #[error("阶段工期必须位于 [0, 3650] 天: stage={stage}, duration_days={duration_days}")]
    InvalidDuration { stage: String, duration_days: f64 },

    #[error("阶段表总工期必须大于 0")]
    ZeroCycle,
}

// ==========================================
// StageTable - 全序阶段表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StageDefinition>", into = "Vec<StageDefinition>")]
pub struct StageTable {
    stages: Vec<StageDefinition>,
}

impl StageTable {
    /// 创建并校验阶段表
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, StageTableError> {
        if stages.is_empty() {
            return Err(StageTableError::Empty);
        }

        let mut previous = 0.0_f64;
        for (idx, stage) in stages.iter().enumerate() {
            if stages[..idx].iter().any(|s| s.name == stage.name) {
                return Err(StageTableError::DuplicateStage(stage.name.clone()));
            }
            if !(stage.threshold_pct > previous && stage.threshold_pct <= 100.0) {
                return Err(StageTableError::InvalidThreshold {
                    stage: stage.name.clone(),
                    threshold: stage.threshold_pct,
                });
            }
            if !(stage.duration_days >= 0.0 && stage.duration_days <= MAX_STAGE_DURATION_DAYS) {
                return Err(StageTableError::InvalidDuration {
                    stage: stage.name.clone(),
                    duration_days: stage.duration_days,
                });
            }
            previous = stage.threshold_pct;
        }

        if previous != 100.0 {
            return Err(StageTableError::LastThresholdNot100(previous));
        }
        if stages.iter().map(|s| s.duration_days).sum::<f64>() <= 0.0 {
            return Err(StageTableError::ZeroCycle);
        }

        Ok(Self { stages })
    }

    /// 定制家具默认阶段表 (14 天周期)
    pub fn made_to_order_default() -> Self {
        Self {
            stages: vec![
                StageDefinition::new("Material Preparation", 10.0, 1.5),
                StageDefinition::new("Cutting & Shaping", 30.0, 2.5),
                StageDefinition::new("Assembly", 60.0, 4.0),
                StageDefinition::new("Sanding", 75.0, 2.0),
                StageDefinition::new("Finishing", 95.0, 2.5),
                StageDefinition::new("Quality Check", 100.0, 1.5),
            ],
        }
    }

    /// 库存品默认阶段表 (5 天周期)
    pub fn stocked_good_default() -> Self {
        Self {
            stages: vec![
                StageDefinition::new("Material Preparation", 20.0, 1.0),
                StageDefinition::new("Batch Production", 70.0, 2.5),
                StageDefinition::new("Quality Check", 90.0, 1.0),
                StageDefinition::new("Packaging", 100.0, 0.5),
            ],
        }
    }

    pub fn default_for(class: ProductClass) -> Self {
        match class {
            ProductClass::MadeToOrder => Self::made_to_order_default(),
            ProductClass::StockedGood => Self::stocked_good_default(),
        }
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn first(&self) -> &StageDefinition {
        &self.stages[0]
    }

    pub fn last(&self) -> &StageDefinition {
        &self.stages[self.stages.len() - 1]
    }

    /// 总周期 (天)
    pub fn total_cycle_days(&self) -> f64 {
        self.stages.iter().map(|s| s.duration_days).sum()
    }

    /// 进度对应的阶段下标
    ///
    /// 取阈值 <= progress 的最后一个阶段; 恰好等于阈值时选中该阶段而非下一个。
    /// 尚未到达首阶段阈值时返回首阶段。
    pub fn stage_index_for(&self, progress: f64) -> usize {
        self.stages
            .iter()
            .rposition(|s| s.threshold_pct <= progress)
            .unwrap_or(0)
    }

    /// 进度对应的阶段 (纯函数)
    pub fn stage_for(&self, progress: f64) -> &StageDefinition {
        &self.stages[self.stage_index_for(progress)]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }
}

impl TryFrom<Vec<StageDefinition>> for StageTable {
    type Error = StageTableError;

    fn try_from(stages: Vec<StageDefinition>) -> Result<Self, Self::Error> {
        StageTable::new(stages)
    }
}

impl From<StageTable> for Vec<StageDefinition> {
    fn from(table: StageTable) -> Self {
        table.stages
    }
}

// ==========================================
// StageCatalog - 按产品分类索引的阶段表集合
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCatalog {
    pub made_to_order: StageTable,
    pub stocked_good: StageTable,
}

impl StageCatalog {
    pub fn new(made_to_order: StageTable, stocked_good: StageTable) -> Self {
        Self {
            made_to_order,
            stocked_good,
        }
    }

    pub fn table_for(&self, class: ProductClass) -> &StageTable {
        match class {
            ProductClass::MadeToOrder => &self.made_to_order,
            ProductClass::StockedGood => &self.stocked_good,
        }
    }
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::new(
            StageTable::made_to_order_default(),
            StageTable::stocked_good_default(),
        )
    }
}
