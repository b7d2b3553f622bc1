use std::sync::Arc;

use pulse_core::models::Alert;
use pulse_core::traits::HealthRepository;
use pulse_infrastructure::{MetricsCollector, StructuredLogger, TimeoutHandler};
use tracing::warn;

/// 告警写入器
///
/// 逐条写入持久化层。单条写入失败只记录日志，不影响其余告警和所在任务。
pub struct AlertEmitter {
    repository: Arc<dyn HealthRepository>,
    timeouts: TimeoutHandler,
    metrics: MetricsCollector,
}

/// 一次写入的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub emitted: usize,
    pub failed: usize,
}

impl AlertEmitter {
    pub fn new(
        repository: Arc<dyn HealthRepository>,
        timeouts: TimeoutHandler,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            repository,
            timeouts,
            metrics,
        }
    }

    pub async fn emit(&self, alerts: &[Alert]) -> EmitSummary {
        let mut summary = EmitSummary::default();

        for alert in alerts {
            let result = self
                .timeouts
                .persistence_operation(self.repository.insert_alert(alert), "insert_alert")
                .await;

            match result {
                Ok(()) => {
                    summary.emitted += 1;
                    StructuredLogger::log_alert_emitted(alert);
                    self.metrics.record_alert_emitted(alert.severity);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        location.id = %alert.target_id,
                        alert.type = alert.alert_type.as_str(),
                        error = %e,
                        "告警写入失败"
                    );
                }
            }
        }

        summary
    }
}
