// ==========================================
// 日产出聚合引擎集成测试
// ==========================================
// 职责: 验证原料约束、效率计算、成品入库与重跑跳过
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod output_aggregator_test {
    use chrono::NaiveDate;
    use furniture_production::config::engine_config_trait::EngineConfig;
    use furniture_production::domain::{LedgerSource, ProductClass};
    use furniture_production::engine::{
        DailyOutputInput, DailyOutputStatus, EngineError, EngineWarning, OutputAnalyticsAggregator,
        StockLedger,
    };
    use furniture_production::repository::{InventoryLedgerRepository, ProductionAnalyticsRepository};
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    use crate::test_helpers::{
        base_time, count_rows, create_test_db, on_hand, open_shared, seed_material, seed_product,
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    /// 库存椅: 每件耗用 2 单位 M-BEECH, 产出入库 FG-CHAIR
    fn setup() -> (NamedTempFile, Arc<Mutex<Connection>>, OutputAnalyticsAggregator) {
        let (tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared(&db_path);

        seed_material(&conn, "M-BEECH", 100.0, 10.0);
        seed_material(&conn, "M-VARNISH", 30.0, 0.0);
        seed_material(&conn, "FG-CHAIR", 0.0, 0.0);
        seed_product(
            &conn,
            "P-CHAIR",
            ProductClass::StockedGood,
            Some("FG-CHAIR"),
            &[("M-BEECH", 2.0)],
        );
        seed_product(
            &conn,
            "P-STOOL",
            ProductClass::StockedGood,
            None,
            &[("M-VARNISH", 0.5)],
        );
        seed_product(&conn, "P-EMPTY", ProductClass::StockedGood, None, &[]);
        seed_product(&conn, "P-WARDROBE", ProductClass::MadeToOrder, None, &[("M-BEECH", 20.0)]);

        let aggregator = OutputAnalyticsAggregator::new(conn.clone(), Arc::new(EngineConfig::default()));
        (tmp, conn, aggregator)
    }

    #[test]
    fn test_output_is_capped_by_material() {
        let (_tmp, conn, aggregator) = setup();

        let outcome = aggregator.run_day("P-CHAIR", day(2), 60, base_time()).unwrap();
        assert_eq!(outcome.status, DailyOutputStatus::Capped);
        assert_eq!(outcome.max_producible, Some(50));
        assert_eq!(outcome.actual_output, 50);
        assert_eq!(outcome.target_output, 60);
        assert_eq!(outcome.efficiency_percentage, Some(83.33));
        assert!(outcome.warnings.is_empty());

        assert_eq!(on_hand(&conn, "M-BEECH"), 0.0);
        assert_eq!(on_hand(&conn, "FG-CHAIR"), 50.0);

        let row = ProductionAnalyticsRepository::new(conn.clone())
            .find(day(2), "P-CHAIR")
            .unwrap()
            .unwrap();
        assert_eq!(row.target_output, 60);
        assert_eq!(row.actual_output, 50);
        assert_eq!(row.efficiency_percentage, 83.33);
    }

    #[test]
    fn test_full_output_efficiency_is_capped() {
        let (_tmp, conn, aggregator) = setup();

        let outcome = aggregator.run_day("P-CHAIR", day(2), 20, base_time()).unwrap();
        assert_eq!(outcome.status, DailyOutputStatus::Recorded);
        assert_eq!(outcome.actual_output, 20);
        assert_eq!(outcome.efficiency_percentage, Some(99.0));
        assert_eq!(on_hand(&conn, "M-BEECH"), 60.0);
    }

    #[test]
    fn test_rerun_same_day_is_skipped() {
        let (_tmp, conn, aggregator) = setup();
        aggregator.run_day("P-CHAIR", day(2), 10, base_time()).unwrap();

        let rerun = aggregator.run_day("P-CHAIR", day(2), 10, base_time()).unwrap();
        assert_eq!(rerun.status, DailyOutputStatus::SkippedAlreadyRecorded);
        assert_eq!(
            rerun.warnings,
            vec![EngineWarning::AlreadyRecorded {
                product_id: "P-CHAIR".to_string()
            }]
        );
        assert!(rerun.debits.is_empty());
        assert_eq!(on_hand(&conn, "M-BEECH"), 80.0);
        assert_eq!(count_rows(&conn, "production_analytics"), 1);
    }

    #[test]
    fn test_zero_output_writes_no_row() {
        let (_tmp, conn, aggregator) = setup();
        aggregator.run_day("P-CHAIR", day(2), 60, base_time()).unwrap();

        let outcome = aggregator.run_day("P-CHAIR", day(3), 40, base_time()).unwrap();
        assert_eq!(outcome.status, DailyOutputStatus::ZeroOutput);
        assert_eq!(outcome.max_producible, Some(0));
        assert_eq!(outcome.actual_output, 0);
        assert_eq!(outcome.efficiency_percentage, None);
        assert_eq!(
            outcome.warnings,
            vec![EngineWarning::ZeroOutput {
                product_id: "P-CHAIR".to_string()
            }]
        );

        let analytics = ProductionAnalyticsRepository::new(conn.clone());
        assert!(analytics.find(day(3), "P-CHAIR").unwrap().is_none());
        assert_eq!(count_rows(&conn, "production_analytics"), 1);
    }

    #[test]
    fn test_missing_bom_and_made_to_order_are_skipped() {
        let (_tmp, conn, aggregator) = setup();

        let empty = aggregator.run_day("P-EMPTY", day(2), 5, base_time()).unwrap();
        assert_eq!(empty.status, DailyOutputStatus::SkippedMissingBom);
        assert_eq!(
            empty.warnings,
            vec![EngineWarning::MissingBom {
                product_id: "P-EMPTY".to_string()
            }]
        );

        let wardrobe = aggregator.run_day("P-WARDROBE", day(2), 1, base_time()).unwrap();
        assert_eq!(wardrobe.status, DailyOutputStatus::SkippedNotContinuous);
        assert_eq!(on_hand(&conn, "M-BEECH"), 100.0);
        assert_eq!(count_rows(&conn, "production_analytics"), 0);
    }

    #[test]
    fn test_missing_finished_goods_item_still_records() {
        let (_tmp, conn, aggregator) = setup();

        let outcome = aggregator.run_day("P-STOOL", day(2), 10, base_time()).unwrap();
        assert_eq!(outcome.status, DailyOutputStatus::Recorded);
        assert_eq!(
            outcome.warnings,
            vec![EngineWarning::MissingFinishedGoodsMaterial {
                product_id: "P-STOOL".to_string()
            }]
        );
        assert_eq!(on_hand(&conn, "M-VARNISH"), 25.0);
        assert_eq!(count_rows(&conn, "inventory_receipt"), 0);
    }

    #[test]
    fn test_ledger_rows_replay_to_balances() {
        let (_tmp, conn, aggregator) = setup();
        aggregator.run_day("P-CHAIR", day(2), 15, base_time()).unwrap();
        aggregator.run_day("P-CHAIR", day(3), 15, base_time()).unwrap();

        let ledger_repo = InventoryLedgerRepository::new(conn.clone());
        let usage = ledger_repo.list_usage("M-BEECH", day(1), day(31)).unwrap();
        assert_eq!(usage.len(), 2);
        assert!(usage.iter().all(|u| u.source == LedgerSource::DailyProduction));
        assert!(usage.iter().all(|u| u.reference_id.as_deref() == Some("P-CHAIR")));

        let receipts = ledger_repo.list_receipts("FG-CHAIR", day(1), day(31)).unwrap();
        assert_eq!(receipts.len(), 2);
        assert!(receipts.iter().all(|r| r.source == LedgerSource::ProductionOutput));

        let ledger = StockLedger::new(conn.clone());
        let beech = ledger.replay_balance("M-BEECH").unwrap();
        assert!(beech.is_consistent());
        assert_eq!(beech.quantity_on_hand, 40.0);

        let chairs = ledger.replay_balance("FG-CHAIR").unwrap();
        assert!(chairs.is_consistent());
        assert_eq!(chairs.quantity_on_hand, 30.0);
    }

    #[test]
    fn test_unknown_product_fails() {
        let (_tmp, _conn, aggregator) = setup();
        let err = aggregator.run_day("P-404", day(2), 1, base_time()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownProduct(_)));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let (_tmp, conn, aggregator) = setup();
        let inputs = vec![
            DailyOutputInput {
                product_id: "P-CHAIR".to_string(),
                candidate_output: 10,
            },
            DailyOutputInput {
                product_id: "P-404".to_string(),
                candidate_output: 3,
            },
            DailyOutputInput {
                product_id: "P-STOOL".to_string(),
                candidate_output: 4,
            },
        ];

        let report = aggregator.run_batch(day(2), &inputs, base_time()).unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "P-404");
        assert!(report.outcomes.iter().all(|o| o.status.is_recorded()));

        let rows = ProductionAnalyticsRepository::new(conn.clone())
            .list_by_date(day(2))
            .unwrap();
        assert_eq!(rows.len(), 2);
    }
}
