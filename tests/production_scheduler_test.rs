// ==========================================
// 生产调度引擎集成测试
// ==========================================
// 职责: 验证受理建档、物料扣减、进度推进、延期重排
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod production_scheduler_test {
    use chrono::Duration;
    use furniture_production::config::engine_config_trait::EngineConfig;
    use furniture_production::domain::{
        AcceptanceStatus, ProcessStatus, ProductClass, ProductionStatus,
    };
    use furniture_production::engine::production_scheduler::MAX_DELAY_DAYS;
    use furniture_production::engine::{EngineError, EngineWarning, ProductionScheduler};
    use furniture_production::repository::{
        InventoryLedgerRepository, OrderRepository, ProductionRepository,
    };
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    use crate::test_helpers::{
        base_time, count_rows, create_test_db, days_after, on_hand, open_shared, seed_accepted_order,
        seed_material, seed_pending_order, seed_product,
    };

    // ==========================================
    // 测试辅助函数
    // ==========================================

    /// 定制沙发 (橡木 4 + 面料 3) 与库存茶几 (橡木 2)
    fn setup() -> (NamedTempFile, Arc<Mutex<Connection>>, ProductionScheduler) {
        let (tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared(&db_path);

        seed_material(&conn, "M-OAK", 100.0, 10.0);
        seed_material(&conn, "M-FABRIC", 5.0, 2.0);
        seed_product(
            &conn,
            "P-SOFA",
            ProductClass::MadeToOrder,
            None,
            &[("M-OAK", 4.0), ("M-FABRIC", 3.0)],
        );
        seed_product(&conn, "P-TABLE", ProductClass::StockedGood, None, &[("M-OAK", 2.0)]);
        seed_product(&conn, "P-BARE", ProductClass::MadeToOrder, None, &[]);

        let scheduler = ProductionScheduler::new(conn.clone(), Arc::new(EngineConfig::default()));
        (tmp, conn, scheduler)
    }

    // ==========================================
    // 受理
    // ==========================================

    #[test]
    fn test_pending_order_yields_no_production() {
        let (_tmp, conn, scheduler) = setup();
        seed_pending_order(&conn, "ORD-1", "P-SOFA", 1, base_time());

        let err = scheduler.accept_order("ORD-1", base_time()).unwrap_err();
        match err {
            EngineError::OrderNotAccepted { order_id, status } => {
                assert_eq!(order_id, "ORD-1");
                assert_eq!(status, AcceptanceStatus::Pending);
            }
            other => panic!("期望 OrderNotAccepted, 实际: {:?}", other),
        }

        assert_eq!(count_rows(&conn, "production"), 0);
        assert_eq!(count_rows(&conn, "inventory_usage"), 0);
        assert_eq!(on_hand(&conn, "M-OAK"), 100.0);
    }

    #[test]
    fn test_rejected_order_yields_no_production() {
        let (_tmp, conn, scheduler) = setup();
        seed_pending_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        OrderRepository::new(conn.clone()).mark_rejected("ORD-1").unwrap();

        let err = scheduler.accept_order("ORD-1", base_time()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::OrderNotAccepted {
                status: AcceptanceStatus::Rejected,
                ..
            }
        ));
        assert_eq!(count_rows(&conn, "production"), 0);
    }

    #[test]
    fn test_unknown_order_is_reported() {
        let (_tmp, _conn, scheduler) = setup();
        let err = scheduler.accept_order("ORD-404", base_time()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownOrder(_)));
    }

    #[test]
    fn test_accept_and_start_marks_order_and_creates_production() {
        let (_tmp, conn, scheduler) = setup();
        seed_pending_order(&conn, "ORD-1", "P-SOFA", 1, base_time());

        let outcome = scheduler.accept_and_start("ORD-1", base_time()).unwrap();
        assert!(outcome.newly_created);

        let order = OrderRepository::new(conn.clone()).find_by_id("ORD-1").unwrap().unwrap();
        assert_eq!(order.acceptance_status, AcceptanceStatus::Accepted);
        assert_eq!(order.accepted_at, Some(base_time()));
        assert_eq!(count_rows(&conn, "production"), 1);
        assert_eq!(on_hand(&conn, "M-OAK"), 96.0);
    }

    #[test]
    fn test_accept_and_start_rejected_order_stays_rejected() {
        let (_tmp, conn, scheduler) = setup();
        seed_pending_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        OrderRepository::new(conn.clone()).mark_rejected("ORD-1").unwrap();

        let err = scheduler.accept_and_start("ORD-1", base_time()).unwrap_err();
        assert!(matches!(err, EngineError::Repository(_)));
        assert_eq!(count_rows(&conn, "production"), 0);
        assert_eq!(on_hand(&conn, "M-OAK"), 100.0);
    }

    /// 第二行物料需求溢出为 inf, 第一行已扣减的橡木须一并回滚
    #[test]
    fn test_failed_debit_rolls_back_whole_acceptance() {
        let (_tmp, conn, scheduler) = setup();
        seed_product(
            &conn,
            "P-HUGE",
            ProductClass::MadeToOrder,
            None,
            &[("M-OAK", 4.0), ("M-FABRIC", 1e308)],
        );
        seed_pending_order(&conn, "ORD-1", "P-HUGE", 2, base_time());

        let err = scheduler.accept_and_start("ORD-1", base_time()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        let order = OrderRepository::new(conn.clone()).find_by_id("ORD-1").unwrap().unwrap();
        assert_eq!(order.acceptance_status, AcceptanceStatus::Pending);
        assert_eq!(order.accepted_at, None);
        assert_eq!(count_rows(&conn, "production"), 0);
        assert_eq!(count_rows(&conn, "production_process"), 0);
        assert_eq!(count_rows(&conn, "inventory_usage"), 0);
        assert_eq!(on_hand(&conn, "M-OAK"), 100.0);
        assert_eq!(on_hand(&conn, "M-FABRIC"), 5.0);
    }

    #[test]
    fn test_failed_debit_on_accepted_order_leaves_no_production() {
        let (_tmp, conn, scheduler) = setup();
        seed_product(
            &conn,
            "P-HUGE",
            ProductClass::MadeToOrder,
            None,
            &[("M-OAK", 4.0), ("M-FABRIC", 1e308)],
        );
        seed_accepted_order(&conn, "ORD-1", "P-HUGE", 2, base_time());

        assert!(scheduler.accept_order("ORD-1", base_time()).is_err());
        assert_eq!(count_rows(&conn, "production"), 0);
        assert_eq!(count_rows(&conn, "production_process"), 0);
        assert_eq!(count_rows(&conn, "inventory_usage"), 0);
        assert_eq!(on_hand(&conn, "M-OAK"), 100.0);
    }

    #[test]
    fn test_accept_debits_bom_and_caps_short_material() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 2, base_time());

        let outcome = scheduler.accept_order("ORD-1", base_time()).unwrap();
        assert!(outcome.newly_created);
        assert_eq!(outcome.debits.len(), 2);

        assert_eq!(on_hand(&conn, "M-OAK"), 92.0);
        assert_eq!(on_hand(&conn, "M-FABRIC"), 0.0);
        assert_eq!(
            outcome.warnings,
            vec![EngineWarning::InsufficientStock {
                material_id: "M-FABRIC".to_string(),
                requested: 6.0,
                debited: 5.0,
            }]
        );

        let usage = InventoryLedgerRepository::new(conn.clone())
            .list_usage_by_reference("ORD-1")
            .unwrap();
        let total: f64 = usage.iter().map(|u| u.qty_used).sum();
        assert_eq!(usage.len(), 2);
        assert_eq!(total, 13.0);
    }

    #[test]
    fn test_accept_starts_at_min_visible_progress() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());

        let outcome = scheduler.accept_order("ORD-1", base_time()).unwrap();
        let production = &outcome.production;

        assert_eq!(production.overall_progress, 5.0);
        assert_eq!(production.current_stage, "Material Preparation");
        assert_eq!(production.status, ProductionStatus::InProgress);
        assert_eq!(production.production_started_at, base_time());
        assert_eq!(production.estimated_completion_date, base_time() + Duration::days(14));

        assert_eq!(outcome.processes.len(), 6);
        assert_eq!(outcome.processes[0].status, ProcessStatus::InProgress);
        assert!(outcome.processes[1..].iter().all(|p| p.status == ProcessStatus::Pending));
    }

    #[test]
    fn test_accept_late_uses_elapsed_cycle_progress() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());

        let now = days_after(base_time(), 5.6);
        let outcome = scheduler.accept_order("ORD-1", now).unwrap();

        assert_eq!(outcome.production.overall_progress, 40.0);
        assert_eq!(outcome.production.current_stage, "Cutting & Shaping");

        let statuses: Vec<_> = outcome.processes.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                ProcessStatus::Completed,
                ProcessStatus::Completed,
                ProcessStatus::InProgress,
                ProcessStatus::Pending,
                ProcessStatus::Pending,
                ProcessStatus::Pending,
            ]
        );
    }

    #[test]
    fn test_reaccept_does_not_debit_twice() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());

        let first = scheduler.accept_order("ORD-1", base_time()).unwrap();
        let second = scheduler.accept_order("ORD-1", days_after(base_time(), 1.0)).unwrap();

        assert!(!second.newly_created);
        assert!(second.debits.is_empty());
        assert_eq!(second.production.production_id, first.production.production_id);
        assert_eq!(count_rows(&conn, "production"), 1);
        assert_eq!(count_rows(&conn, "inventory_usage"), 2);
        assert_eq!(on_hand(&conn, "M-OAK"), 96.0);
    }

    #[test]
    fn test_missing_bom_still_creates_production() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-BARE", 1, base_time());

        let outcome = scheduler.accept_order("ORD-1", base_time()).unwrap();
        assert!(outcome.debits.is_empty());
        assert_eq!(
            outcome.warnings,
            vec![EngineWarning::MissingBom {
                product_id: "P-BARE".to_string()
            }]
        );
        assert_eq!(count_rows(&conn, "production"), 1);
    }

    #[test]
    fn test_stocked_good_has_no_processes() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-TABLE", 3, base_time());

        let outcome = scheduler.accept_order("ORD-1", base_time()).unwrap();
        assert!(outcome.processes.is_empty());
        assert_eq!(outcome.production.estimated_completion_date, base_time() + Duration::days(5));
        assert_eq!(on_hand(&conn, "M-OAK"), 94.0);

        let err = scheduler
            .delay_stage("ORD-1", "Batch Production", 1.0, "设备检修")
            .unwrap_err();
        assert!(matches!(err, EngineError::NoProcessTracking(_)));
    }

    #[test]
    fn test_every_accepted_order_has_exactly_one_production() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-A", "P-SOFA", 1, base_time());
        seed_pending_order(&conn, "ORD-B", "P-SOFA", 1, base_time());
        seed_accepted_order(&conn, "ORD-C", "P-TABLE", 1, base_time());

        for id in ["ORD-A", "ORD-B", "ORD-C", "ORD-A"] {
            let _ = scheduler.accept_order(id, base_time());
        }

        let productions = ProductionRepository::new(conn.clone());
        for order in OrderRepository::new(conn.clone()).list_all().unwrap() {
            let expected = i64::from(order.is_accepted());
            assert_eq!(
                productions.count_for_order(&order.order_id).unwrap(),
                expected,
                "order={}",
                order.order_id
            );
        }
    }

    // ==========================================
    // 推进
    // ==========================================

    #[test]
    fn test_progress_never_decreases() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        scheduler.accept_order("ORD-1", base_time()).unwrap();

        let now = days_after(base_time(), 1.0);
        let mut observed = Vec::new();
        for p in [40.0, 20.0, 65.0, 10.0, 80.0] {
            observed.push(scheduler.advance("ORD-1", p, now).unwrap().overall_progress);
        }

        assert_eq!(observed, vec![40.0, 40.0, 65.0, 65.0, 80.0]);
        assert_eq!(
            ProductionRepository::new(conn.clone())
                .find_by_order("ORD-1")
                .unwrap()
                .unwrap()
                .current_stage,
            "Sanding"
        );
    }

    #[test]
    fn test_advance_rejects_non_finite_progress() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        scheduler.accept_order("ORD-1", base_time()).unwrap();

        let err = scheduler.advance("ORD-1", f64::NAN, base_time()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_advance_to_100_completes_production() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        scheduler.accept_order("ORD-1", base_time()).unwrap();

        let done_at = days_after(base_time(), 15.0);
        let production = scheduler.advance_to("ORD-1", done_at).unwrap();
        assert_eq!(production.overall_progress, 100.0);
        assert_eq!(production.status, ProductionStatus::Completed);
        assert_eq!(production.current_stage, "Quality Check");
        assert_eq!(production.actual_completion_date, Some(done_at));

        let processes = ProductionRepository::new(conn.clone())
            .find_processes(&production.production_id)
            .unwrap();
        assert!(processes.iter().all(|p| p.status == ProcessStatus::Completed));

        let err = scheduler.advance("ORD-1", 100.0, done_at).unwrap_err();
        assert!(matches!(err, EngineError::ProductionCompleted(_)));
    }

    #[test]
    fn test_advance_all_continues_past_completed_orders() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-SOFA", "P-SOFA", 1, base_time());
        seed_accepted_order(&conn, "ORD-TABLE", "P-TABLE", 1, base_time());
        scheduler.accept_order("ORD-SOFA", base_time()).unwrap();
        scheduler.accept_order("ORD-TABLE", base_time()).unwrap();

        let summary = scheduler.advance_all(days_after(base_time(), 7.0)).unwrap();
        assert_eq!(summary.advanced, 2);
        assert_eq!(summary.completed, 1);
        assert!(summary.failures.is_empty());

        let repo = ProductionRepository::new(conn.clone());
        let sofa = repo.find_by_order("ORD-SOFA").unwrap().unwrap();
        assert_eq!(sofa.overall_progress, 50.0);
        assert_eq!(sofa.current_stage, "Cutting & Shaping");

        let summary = scheduler.advance_all(days_after(base_time(), 8.0)).unwrap();
        assert_eq!(summary.advanced, 1);
    }

    // ==========================================
    // 延期
    // ==========================================

    #[test]
    fn test_delay_shifts_later_stages_only() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        let accepted = scheduler.accept_order("ORD-1", base_time()).unwrap();
        let before = accepted.processes;

        let outcome = scheduler
            .delay_stage("ORD-1", "Cutting & Shaping", 2.0, "板材到货延迟")
            .unwrap();
        let after = outcome.processes;

        assert_eq!(after[0].planned_start_at, before[0].planned_start_at);
        assert_eq!(after[0].planned_end_at, before[0].planned_end_at);
        assert_eq!(after[1].planned_start_at, before[1].planned_start_at);
        assert_eq!(after[1].planned_end_at, before[1].planned_end_at + Duration::days(2));
        for idx in 2..after.len() {
            assert_eq!(
                after[idx].planned_start_at,
                before[idx].planned_start_at + Duration::days(2),
                "stage={}",
                after[idx].process_name
            );
        }

        assert!(after[1].is_delayed);
        assert_eq!(after[1].delay_days, 2.0);
        assert_eq!(after[1].delay_reason.as_deref(), Some("板材到货延迟"));
        assert_eq!(
            outcome.production.estimated_completion_date,
            accepted.production.estimated_completion_date + Duration::days(2)
        );

        let stored = ProductionRepository::new(conn.clone())
            .find_processes(&outcome.production.production_id)
            .unwrap();
        assert_eq!(stored[2].planned_start_at, after[2].planned_start_at);
    }

    #[test]
    fn test_delays_accumulate() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        let accepted = scheduler.accept_order("ORD-1", base_time()).unwrap();

        scheduler.delay_stage("ORD-1", "Assembly", 1.0, "胶水固化").unwrap();
        let outcome = scheduler.delay_stage("ORD-1", "Assembly", 1.5, "人手不足").unwrap();

        assert_eq!(outcome.processes[2].delay_days, 2.5);
        assert_eq!(outcome.processes[2].delay_reason.as_deref(), Some("人手不足"));
        assert_eq!(
            outcome.production.estimated_completion_date,
            accepted.production.estimated_completion_date + Duration::milliseconds(216_000_000)
        );
    }

    #[test]
    fn test_delay_slows_time_based_progress() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        scheduler.accept_order("ORD-1", base_time()).unwrap();
        scheduler.delay_stage("ORD-1", "Finishing", 2.0, "喷漆返工").unwrap();

        let production = scheduler.advance_to("ORD-1", days_after(base_time(), 8.0)).unwrap();
        assert_eq!(production.overall_progress, 50.0);
    }

    #[test]
    fn test_delay_rejects_invalid_requests() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        scheduler.accept_order("ORD-1", days_after(base_time(), 5.6)).unwrap();

        let err = scheduler.delay_stage("ORD-1", "Assembly", 0.0, "无").unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        let err = scheduler.delay_stage("ORD-1", "Polishing", 1.0, "无").unwrap_err();
        assert!(matches!(err, EngineError::StageNotFound(_)));

        let err = scheduler
            .delay_stage("ORD-1", "Material Preparation", 1.0, "无")
            .unwrap_err();
        assert!(matches!(err, EngineError::StageAlreadyCompleted(_)));

        let err = scheduler.delay_stage("ORD-404", "Assembly", 1.0, "无").unwrap_err();
        assert!(matches!(err, EngineError::UnknownOrder(_)));
    }

    #[test]
    fn test_oversized_delay_is_rejected_without_poisoning_connection() {
        let (_tmp, conn, scheduler) = setup();
        seed_accepted_order(&conn, "ORD-1", "P-SOFA", 1, base_time());
        scheduler.accept_order("ORD-1", base_time()).unwrap();

        for extra in [1e15, f64::MAX, MAX_DELAY_DAYS + 1.0] {
            let err = scheduler.delay_stage("ORD-1", "Assembly", extra, "无").unwrap_err();
            assert!(matches!(err, EngineError::InvalidArgument(_)), "extra={}", extra);
        }

        // 累计延期同样受上限约束
        scheduler.delay_stage("ORD-1", "Assembly", MAX_DELAY_DAYS, "停工").unwrap();
        let err = scheduler.delay_stage("ORD-1", "Assembly", 1.0, "无").unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        // 连接未被 poison, 后续操作照常
        let production = scheduler.advance("ORD-1", 50.0, base_time()).unwrap();
        assert_eq!(production.overall_progress, 50.0);
        let processes = ProductionRepository::new(conn.clone())
            .find_processes(&production.production_id)
            .unwrap();
        assert_eq!(processes[2].delay_days, MAX_DELAY_DAYS);
    }
}
