// ==========================================
// 生产调度 - 排程窗口与进度推算 (纯函数)
// ==========================================
// 约束: 工期按毫秒整数计算, 延期平移量精确
// ==========================================

use crate::config::stage_definition::StageTable;
use crate::domain::production::{Production, ProductionProcess};
use crate::domain::types::{ProcessStatus, ProductionStatus};
use crate::engine::error::{EngineError, EngineResult};
use chrono::{DateTime, Duration, Utc};

pub const MS_PER_DAY: i64 = 86_400_000;

/// 天数 → 毫秒 (四舍五入, 超出 i64 范围时饱和)
pub fn days_to_ms(days: f64) -> i64 {
    (days * MS_PER_DAY as f64).round() as i64
}

/// 时间点加天数; 非有限值或超出日期范围返回 InvalidArgument
pub fn add_days(at: DateTime<Utc>, days: f64) -> EngineResult<DateTime<Utc>> {
    let ms = (days * MS_PER_DAY as f64).round();
    let out_of_range = || EngineError::InvalidArgument(format!("工期超出可表示的日期范围: {} 天", days));
    if !ms.is_finite() || ms.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    Duration::try_milliseconds(ms as i64)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(out_of_range)
}

/// 按有效工期依次累加出每个阶段的 [开始, 结束) 窗口
pub fn plan_windows(
    started_at: DateTime<Utc>,
    durations: &[f64],
) -> EngineResult<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    let mut cursor = started_at;
    let mut windows = Vec::with_capacity(durations.len());
    for d in durations {
        let start = cursor;
        cursor = add_days(cursor, *d)?;
        windows.push((start, cursor));
    }
    Ok(windows)
}

/// 按已过时间推算进度 (%)
///
/// round(elapsed / cycle × 100), 截断到 [0, 100]; 周期为 0 视为已完成
pub fn elapsed_progress(started_at: DateTime<Utc>, now: DateTime<Utc>, cycle_days: f64) -> f64 {
    let cycle_ms = days_to_ms(cycle_days);
    if cycle_ms <= 0 {
        return 100.0;
    }
    let elapsed_ms = (now - started_at).num_milliseconds().max(0);
    ((elapsed_ms as f64 / cycle_ms as f64) * 100.0).round().clamp(0.0, 100.0)
}

/// 工序有效总工期
pub fn effective_cycle_days(processes: &[ProductionProcess]) -> f64 {
    processes.iter().map(|p| p.effective_duration_days()).sum()
}

/// 重新计算工序排程窗口 (延期后调用); 出错时工序保持原窗口
pub fn replan(started_at: DateTime<Utc>, processes: &mut [ProductionProcess]) -> EngineResult<()> {
    let durations: Vec<f64> = processes.iter().map(|p| p.effective_duration_days()).collect();
    let windows = plan_windows(started_at, &durations)?;
    for (process, (start, end)) in processes.iter_mut().zip(windows) {
        process.planned_start_at = start;
        process.planned_end_at = end;
    }
    Ok(())
}

/// 应用进度到生产记录与工序
///
/// # 规则
/// - 进度 = max(原进度, 新进度), 截断到 [0, 100]
/// - current_stage = 阈值 <= 进度 的最后一个阶段
/// - 工序: 阈值 <= 进度 → completed; 之后第一个 → in_progress; 其余 pending
/// - 进度到达 100 → Completed, 记录实际完成时间
///
/// 注意: 工序状态按阈值判定, 跟踪时间线按当前阶段序号判定 (见 tracking_sync::derive)。
/// 进度 40 时 "Cutting & Shaping" 工序已 completed, 时间线上该阶段仍为 in_progress。
pub fn apply_progress(
    production: &mut Production,
    processes: &mut [ProductionProcess],
    table: &StageTable,
    progress: f64,
    now: DateTime<Utc>,
) {
    let progress = production.overall_progress.max(progress).clamp(0.0, 100.0);
    production.overall_progress = progress;
    production.current_stage = table.stage_for(progress).name.clone();

    let mut first_open_seen = false;
    for process in processes.iter_mut() {
        let threshold = usize::try_from(process.process_order - 1)
            .ok()
            .and_then(|idx| table.stages().get(idx))
            .map(|s| s.threshold_pct)
            .unwrap_or(100.0);

        if threshold <= progress {
            process.status = ProcessStatus::Completed;
            process.started_at = process.started_at.or(Some(process.planned_start_at.min(now)));
            process.completed_at = process.completed_at.or(Some(process.planned_end_at.min(now)));
        } else if !first_open_seen {
            first_open_seen = true;
            process.status = ProcessStatus::InProgress;
            process.started_at = process.started_at.or(Some(process.planned_start_at.min(now)));
        } else {
            process.status = ProcessStatus::Pending;
        }
    }

    if progress >= 100.0 && production.status != ProductionStatus::Completed {
        production.status = ProductionStatus::Completed;
        production.actual_completion_date = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ProductClass;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn production() -> Production {
        Production {
            production_id: "PR-1".to_string(),
            order_id: "ORD-1".to_string(),
            product_id: "P-SOFA".to_string(),
            product_class: ProductClass::MadeToOrder,
            quantity: 1,
            current_stage: "Material Preparation".to_string(),
            status: ProductionStatus::InProgress,
            overall_progress: 5.0,
            production_started_at: t0(),
            estimated_completion_date: add_days(t0(), 14.0).unwrap(),
            actual_completion_date: None,
        }
    }

    fn processes(table: &StageTable) -> Vec<ProductionProcess> {
        let durations: Vec<f64> = table.stages().iter().map(|s| s.duration_days).collect();
        table
            .stages()
            .iter()
            .zip(plan_windows(t0(), &durations).unwrap())
            .enumerate()
            .map(|(i, (s, (start, end)))| ProductionProcess {
                process_id: format!("PP-{}", i + 1),
                production_id: "PR-1".to_string(),
                process_name: s.name.clone(),
                process_order: i as i32 + 1,
                status: ProcessStatus::Pending,
                estimated_duration_days: s.duration_days,
                delay_days: 0.0,
                planned_start_at: start,
                planned_end_at: end,
                started_at: None,
                completed_at: None,
                is_delayed: false,
                delay_reason: None,
            })
            .collect()
    }

    #[test]
    fn test_elapsed_progress_rounds_to_whole_percent() {
        let now = add_days(t0(), 5.6).unwrap();
        assert_eq!(elapsed_progress(t0(), now, 14.0), 40.0);
        assert_eq!(elapsed_progress(t0(), t0(), 14.0), 0.0);
        assert_eq!(elapsed_progress(t0(), add_days(t0(), 30.0).unwrap(), 14.0), 100.0);
    }

    #[test]
    fn test_elapsed_progress_clock_before_start_is_zero() {
        let now = t0() - Duration::hours(3);
        assert_eq!(elapsed_progress(t0(), now, 14.0), 0.0);
    }

    #[test]
    fn test_plan_windows_are_contiguous() {
        let windows = plan_windows(t0(), &[1.5, 2.5, 4.0]).unwrap();
        assert_eq!(windows[0].0, t0());
        assert_eq!(windows[0].1, windows[1].0);
        assert_eq!(windows[2].1, add_days(t0(), 8.0).unwrap());
    }

    #[test]
    fn test_apply_progress_marks_processes() {
        let table = StageTable::made_to_order_default();
        let mut prod = production();
        let mut procs = processes(&table);

        apply_progress(&mut prod, &mut procs, &table, 40.0, add_days(t0(), 5.6).unwrap());

        assert_eq!(prod.current_stage, "Cutting & Shaping");
        assert_eq!(procs[0].status, ProcessStatus::Completed);
        assert_eq!(procs[1].status, ProcessStatus::Completed);
        assert_eq!(procs[2].status, ProcessStatus::InProgress);
        assert!(procs[2].started_at.is_some());
        assert_eq!(procs[3].status, ProcessStatus::Pending);
        assert!(procs[3].started_at.is_none());
    }

    #[test]
    fn test_apply_progress_never_regresses() {
        let table = StageTable::made_to_order_default();
        let mut prod = production();
        let mut procs = processes(&table);

        apply_progress(&mut prod, &mut procs, &table, 60.0, t0());
        apply_progress(&mut prod, &mut procs, &table, 20.0, t0());

        assert_eq!(prod.overall_progress, 60.0);
        assert_eq!(prod.current_stage, "Assembly");
    }

    #[test]
    fn test_apply_progress_completes_at_100() {
        let table = StageTable::made_to_order_default();
        let mut prod = production();
        let mut procs = processes(&table);
        let now = add_days(t0(), 14.0).unwrap();

        apply_progress(&mut prod, &mut procs, &table, 100.0, now);

        assert_eq!(prod.status, ProductionStatus::Completed);
        assert_eq!(prod.actual_completion_date, Some(now));
        assert!(procs.iter().all(|p| p.status == ProcessStatus::Completed));
    }

    #[test]
    fn test_replan_shifts_only_later_stages() {
        let table = StageTable::made_to_order_default();
        let mut procs = processes(&table);
        let before: Vec<_> = procs.iter().map(|p| (p.planned_start_at, p.planned_end_at)).collect();

        procs[1].delay_days = 2.0;
        replan(t0(), &mut procs).unwrap();

        assert_eq!((procs[0].planned_start_at, procs[0].planned_end_at), before[0]);
        assert_eq!(procs[1].planned_start_at, before[1].0);
        for i in 2..procs.len() {
            assert_eq!(procs[i].planned_start_at, before[i].0 + Duration::days(2));
            assert_eq!(procs[i].planned_end_at, before[i].1 + Duration::days(2));
        }
    }

    #[test]
    fn test_add_days_out_of_range_is_error() {
        assert!(matches!(add_days(t0(), 1e15), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(add_days(t0(), f64::INFINITY), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(add_days(t0(), f64::NAN), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_replan_overflow_keeps_windows() {
        let table = StageTable::made_to_order_default();
        let mut procs = processes(&table);
        let before: Vec<_> = procs.iter().map(|p| (p.planned_start_at, p.planned_end_at)).collect();

        procs[2].delay_days = 1e15;
        assert!(replan(t0(), &mut procs).is_err());

        let after: Vec<_> = procs.iter().map(|p| (p.planned_start_at, p.planned_end_at)).collect();
        assert_eq!(after, before);
    }
}
