// ==========================================
// 家具生产引擎 - 命令行入口
// ==========================================
// 用法: furniture-production-engine [db_path] [--catalog <dir>]
// 流程: 打开数据库 → (可选) 导入目录 → 时间推进 → 输出库存摘要
// ==========================================

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use furniture_production::app::{get_default_db_path, AppState};
use furniture_production::logging;
use std::path::PathBuf;

struct CliArgs {
    db_path: Option<String>,
    catalog_dir: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut parsed = CliArgs {
        db_path: None,
        catalog_dir: None,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--catalog" => {
                let dir = args.next().ok_or_else(|| anyhow!("--catalog 需要一个目录参数"))?;
                parsed.catalog_dir = Some(PathBuf::from(dir));
            }
            other if other.starts_with("--") => return Err(anyhow!("未知参数: {}", other)),
            other => parsed.db_path = Some(other.to_string()),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", furniture_production::APP_NAME, furniture_production::VERSION);
    tracing::info!("==================================================");

    let args = parse_args()?;
    let db_path = args.db_path.unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).await.map_err(|e| anyhow!(e))?;

    if let Some(dir) = &args.catalog_dir {
        let summary = state
            .catalog_importer
            .import_dir(dir, Utc::now())
            .with_context(|| format!("目录导入失败: {}", dir.display()))?;
        for v in &summary.violations {
            tracing::warn!(file = %v.file, row = v.row, field = %v.field, "{}", v.message);
        }
    }

    let report = state.production_api.tick(Utc::now()).context("时间推进失败")?;
    tracing::info!(
        advanced = report.advance.advanced,
        completed = report.advance.completed,
        synced = report.sync.synced,
        drifted = report.sync.drifted.len(),
        "时间推进完成"
    );

    let overview = state.report_api.stock_overview().context("读取库存总览失败")?;
    tracing::info!(
        materials = overview.items.len(),
        out_of_stock = overview.out_of_stock_count,
        reorder_alerts = overview.reorder_alerts.len(),
        "库存摘要"
    );
    for alert in &overview.reorder_alerts {
        tracing::info!(
            material_id = %alert.material_id,
            on_hand = alert.quantity_on_hand,
            reorder_point = alert.reorder_point,
            suggested = alert.suggested_quantity,
            status = %alert.status,
            "补货提醒"
        );
    }

    Ok(())
}
