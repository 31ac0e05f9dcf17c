// ==========================================
// 家具生产引擎 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::stage_definition::{StageCatalog, StageTable};
use crate::domain::types::ProductClass;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// EngineConfig - 引擎配置快照
// ==========================================
/// 构造引擎时一次性加载, 运行期不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 受理后立即可见的最小进度 (%)
    pub min_visible_progress_pct: f64,
    /// 日产出效率上限 (%)
    pub efficiency_cap_pct: f64,
    /// 阶段表
    pub stages: StageCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_visible_progress_pct: 5.0,
            efficiency_cap_pct: 99.0,
            stages: StageCatalog::default(),
        }
    }
}

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait EngineConfigReader: Send + Sync {
    /// 获取最小可见进度
    ///
    /// # 默认值
    /// - 5
    async fn get_min_visible_progress_pct(&self) -> ConfigResult<f64>;

    /// 获取效率上限
    ///
    /// # 默认值
    /// - 99
    async fn get_efficiency_cap_pct(&self) -> ConfigResult<f64>;

    /// 获取产品分类的阶段表
    ///
    /// # 说明
    /// 配置项 `stage_table/<class>` 为 JSON 数组; 缺失或非法时使用内置表
    async fn get_stage_table(&self, class: ProductClass) -> ConfigResult<StageTable>;

    /// 加载完整配置快照
    async fn load_engine_config(&self) -> ConfigResult<EngineConfig> {
        let min_visible_progress_pct = self.get_min_visible_progress_pct().await?;
        let efficiency_cap_pct = self.get_efficiency_cap_pct().await?;
        let made_to_order = self.get_stage_table(ProductClass::MadeToOrder).await?;
        let stocked_good = self.get_stage_table(ProductClass::StockedGood).await?;

        Ok(EngineConfig {
            min_visible_progress_pct,
            efficiency_cap_pct,
            stages: StageCatalog::new(made_to_order, stocked_good),
        })
    }
}
