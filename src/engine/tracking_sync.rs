// ==========================================
// 家具生产引擎 - 订单跟踪同步
// ==========================================
// 职责: 由订单 + 生产记录派生 OrderTracking 投影并落库
// 红线: 投影不得独立编辑, 仅由本模块写入
// 红线: 同步幂等, 无变化时重复调用不产生写入
// ==========================================

use crate::config::engine_config_trait::EngineConfig;
use crate::config::stage_definition::StageTable;
use crate::db::begin_immediate;
use crate::domain::order::Order;
use crate::domain::production::Production;
use crate::domain::tracking::{OrderTracking, TimelineEntry};
use crate::domain::types::{ProcessStatus, ProductClass, TrackingStatus};
use crate::engine::error::{EngineError, EngineResult, EngineWarning};
use crate::repository::order_repo::OrderRepository;
use crate::repository::product_repo::ProductRepository;
use crate::repository::production_repo::ProductionRepository;
use crate::repository::tracking_repo::OrderTrackingRepository;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub tracking: OrderTracking,
    /// 同步前的存储投影与派生结果不一致
    pub drift: bool,
    /// 本次是否实际写入
    pub written: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncAllSummary {
    pub synced: usize,
    pub written: usize,
    pub drifted: Vec<String>,
    pub failures: Vec<(String, String)>,
}

pub struct TrackingSynchronizer {
    conn: Arc<Mutex<Connection>>,
    config: Arc<EngineConfig>,
}

impl TrackingSynchronizer {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<EngineConfig>) -> Self {
        Self { conn, config }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Lock(e.to_string()))
    }

    /// 派生跟踪投影 (纯函数)
    ///
    /// # 规则
    /// - 无生产记录: pending, 进度 0, 当前阶段为首阶段, 时间线全部 pending
    /// - 已完成: ready_for_delivery, 进度 100, 当前阶段为末阶段, 时间线全部 completed
    /// - 其他: in_production, 进度/阶段取自生产记录;
    ///   当前阶段之前 completed, 当前 in_progress, 之后 pending
    ///   (按阶段序号, 与工序行的阈值判定不同, 见 schedule::apply_progress)
    pub fn derive(
        order: &Order,
        tracking_type: ProductClass,
        production: Option<&Production>,
        table: &StageTable,
    ) -> OrderTracking {
        match production {
            None => OrderTracking {
                order_id: order.order_id.clone(),
                tracking_type,
                current_stage: table.first().name.clone(),
                status: TrackingStatus::Pending,
                progress_percentage: 0.0,
                process_timeline: timeline(table, |_| ProcessStatus::Pending),
            },
            Some(p) if p.is_completed() => OrderTracking {
                order_id: order.order_id.clone(),
                tracking_type,
                current_stage: table.last().name.clone(),
                status: TrackingStatus::ReadyForDelivery,
                progress_percentage: 100.0,
                process_timeline: timeline(table, |_| ProcessStatus::Completed),
            },
            Some(p) => {
                let current = table
                    .index_of(&p.current_stage)
                    .unwrap_or_else(|| table.stage_index_for(p.overall_progress));
                OrderTracking {
                    order_id: order.order_id.clone(),
                    tracking_type,
                    current_stage: table.stages()[current].name.clone(),
                    status: TrackingStatus::InProduction,
                    progress_percentage: p.overall_progress,
                    process_timeline: timeline(table, |idx| {
                        if idx < current {
                            ProcessStatus::Completed
                        } else if idx == current {
                            ProcessStatus::InProgress
                        } else {
                            ProcessStatus::Pending
                        }
                    }),
                }
            }
        }
    }

    /// 同步单个订单的跟踪投影
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn sync(&self, order_id: &str) -> EngineResult<SyncOutcome> {
        let mut conn = self.get_conn()?;
        let tx = begin_immediate(&mut conn)?;

        let derived = self.derive_tx(&tx, order_id)?;
        let stored = OrderTrackingRepository::find_by_order_tx(&tx, order_id)?;

        let drift = stored.as_ref().is_some_and(|s| *s != derived);
        let written = stored.as_ref() != Some(&derived);
        if drift {
            tracing::warn!(order_id = %order_id, "跟踪投影与生产记录不一致, 覆盖写入");
        }
        if written {
            OrderTrackingRepository::upsert_tx(&tx, &derived)?;
        }
        tx.commit()?;

        Ok(SyncOutcome {
            tracking: derived,
            drift,
            written,
        })
    }

    /// 检查跟踪投影是否偏离 (只读)
    ///
    /// # 返回
    /// - Some(TrackingDrift): 已存储的投影与派生结果不同
    /// - None: 一致, 或尚未同步过
    pub fn detect_drift(&self, order_id: &str) -> EngineResult<Option<EngineWarning>> {
        let conn = self.get_conn()?;
        let derived = self.derive_tx(&conn, order_id)?;
        let stored = OrderTrackingRepository::find_by_order_tx(&conn, order_id)?;

        Ok(match stored {
            Some(s) if s != derived => Some(EngineWarning::TrackingDrift {
                order_id: order_id.to_string(),
            }),
            _ => None,
        })
    }

    /// 同步全部订单; 单个订单失败不影响其余
    pub fn sync_all(&self) -> EngineResult<SyncAllSummary> {
        let order_ids = {
            let conn = self.get_conn()?;
            OrderRepository::list_ids_tx(&conn)?
        };

        let mut summary = SyncAllSummary::default();
        for order_id in order_ids {
            match self.sync(&order_id) {
                Ok(outcome) => {
                    summary.synced += 1;
                    if outcome.written {
                        summary.written += 1;
                    }
                    if outcome.drift {
                        summary.drifted.push(order_id);
                    }
                }
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "跟踪同步失败");
                    summary.failures.push((order_id, e.to_string()));
                }
            }
        }

        tracing::info!(
            synced = summary.synced,
            written = summary.written,
            drifted = summary.drifted.len(),
            failed = summary.failures.len(),
            "跟踪同步完成"
        );
        Ok(summary)
    }

    fn derive_tx(&self, conn: &Connection, order_id: &str) -> EngineResult<OrderTracking> {
        let order = OrderRepository::find_by_id_tx(conn, order_id)?
            .ok_or_else(|| EngineError::UnknownOrder(order_id.to_string()))?;
        let production = ProductionRepository::find_by_order_tx(conn, order_id)?;

        let class = match &production {
            Some(p) => p.product_class,
            None => {
                ProductRepository::find_by_id_tx(conn, &order.product_id)?
                    .ok_or_else(|| EngineError::UnknownProduct(order.product_id.clone()))?
                    .product_class
            }
        };

        let table = self.config.stages.table_for(class);
        Ok(Self::derive(&order, class, production.as_ref(), table))
    }
}

fn timeline(table: &StageTable, status_at: impl Fn(usize) -> ProcessStatus) -> Vec<TimelineEntry> {
    table
        .stages()
        .iter()
        .enumerate()
        .map(|(idx, s)| TimelineEntry {
            stage: s.name.clone(),
            status: status_at(idx),
        })
        .collect()
}
