use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use pulse_core::models::{TaskKind, TaskPriority};
use pulse_core::traits::HealthRepository;
use pulse_core::{Clock, PulseResult};
use pulse_infrastructure::{MetricsCollector, StructuredLogger, TimeoutHandler};
use serde::Serialize;
use tracing::{debug, warn};

use crate::dispatcher::TaskDispatcher;

/// 一次扫描的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub known_locations: usize,
    pub stale_locations: usize,
    pub enqueued: usize,
    /// 已有同类任务在途而跳过
    pub skipped_in_flight: usize,
    /// 读取上次计算时间失败的门店数
    pub errors: usize,
}

/// 陈旧度扫描
///
/// 对每个已知门店读取上次计算时间，从未计算或超过陈旧窗口的门店
/// 以 medium 优先级入队一个 health_calculation 任务。
pub struct StalenessScanner {
    repository: Arc<dyn HealthRepository>,
    dispatcher: TaskDispatcher,
    clock: Arc<dyn Clock>,
    timeouts: TimeoutHandler,
    metrics: MetricsCollector,
    staleness_window: TimeDelta,
}

impl StalenessScanner {
    pub fn new(
        repository: Arc<dyn HealthRepository>,
        dispatcher: TaskDispatcher,
        clock: Arc<dyn Clock>,
        timeouts: TimeoutHandler,
        metrics: MetricsCollector,
        staleness_window: TimeDelta,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            clock,
            timeouts,
            metrics,
            staleness_window,
        }
    }

    pub fn is_stale(&self, last_computed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_computed_at {
            None => true,
            Some(at) => now - at > self.staleness_window,
        }
    }

    /// 扫描一次。单个门店读取失败只计数，不中断扫描
    pub async fn scan_once(&self) -> PulseResult<ScanReport> {
        let started = Instant::now();
        let location_ids = self
            .timeouts
            .persistence_operation(
                self.repository.list_known_location_ids(),
                "list_known_location_ids",
            )
            .await?;

        let mut report = ScanReport {
            known_locations: location_ids.len(),
            ..ScanReport::default()
        };

        for location_id in &location_ids {
            let last_computed_at = match self
                .timeouts
                .persistence_operation(
                    self.repository.get_last_computed_at(location_id),
                    "get_last_computed_at",
                )
                .await
            {
                Ok(at) => at,
                Err(e) => {
                    warn!(location.id = %location_id, error = %e, "读取上次计算时间失败");
                    report.errors += 1;
                    continue;
                }
            };

            if !self.is_stale(last_computed_at, self.clock.now()) {
                continue;
            }
            report.stale_locations += 1;

            match self.dispatcher.enqueue_if_absent(
                TaskKind::HealthCalculation,
                location_id,
                TaskPriority::Medium,
            ) {
                Some(task_id) => {
                    debug!(location.id = %location_id, task.id = %task_id, "陈旧门店已入队");
                    report.enqueued += 1;
                }
                None => report.skipped_in_flight += 1,
            }
        }

        let elapsed = started.elapsed();
        StructuredLogger::log_scan_finished(
            report.known_locations,
            report.stale_locations,
            report.enqueued,
            elapsed.as_millis() as u64,
        );
        self.metrics.record_scan(elapsed.as_secs_f64(), report.enqueued);
        Ok(report)
    }
}
