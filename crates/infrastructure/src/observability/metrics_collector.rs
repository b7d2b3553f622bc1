//! Metrics collector for the health engine
//!
//! Records through the `metrics` facade; no exporter is installed here, so
//! every call is a no-op until the embedding binary installs a recorder.

use std::fmt;

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use pulse_core::models::{AlertSeverity, TaskKind};
use tracing::debug;

/// Metrics collector shared by the dispatcher and the cache store
#[derive(Clone)]
pub struct MetricsCollector {
    // Task metrics
    tasks_enqueued_total: Counter,
    tasks_deduplicated_total: Counter,
    task_duration: Histogram,

    // Dispatcher metrics
    queue_depth: Gauge,
    active_tasks: Gauge,
    scan_duration: Histogram,

    // Cache metrics
    cache_hits_total: Counter,
    cache_misses_total: Counter,
    cache_size: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tasks_enqueued_total: counter!("pulse_tasks_enqueued_total"),
            tasks_deduplicated_total: counter!("pulse_tasks_deduplicated_total"),
            task_duration: histogram!("pulse_task_duration_seconds"),
            queue_depth: gauge!("pulse_queue_depth"),
            active_tasks: gauge!("pulse_active_tasks"),
            scan_duration: histogram!("pulse_scan_duration_seconds"),
            cache_hits_total: counter!("pulse_cache_hits_total"),
            cache_misses_total: counter!("pulse_cache_misses_total"),
            cache_size: gauge!("pulse_cache_size"),
        }
    }

    // Task metrics

    pub fn record_task_enqueued(&self, kind: TaskKind) {
        self.tasks_enqueued_total.increment(1);
        counter!("pulse_tasks_enqueued_by_kind_total", "kind" => kind.as_str()).increment(1);
    }

    /// 扫描时因已有同类任务在途而跳过
    pub fn record_task_deduplicated(&self) {
        self.tasks_deduplicated_total.increment(1);
    }

    pub fn record_task_completed(&self, kind: TaskKind, duration_seconds: f64) {
        self.task_duration.record(duration_seconds);
        counter!("pulse_tasks_completed_total", "kind" => kind.as_str()).increment(1);
    }

    pub fn record_task_failed(&self, kind: TaskKind, error_kind: &'static str, duration_seconds: f64) {
        self.task_duration.record(duration_seconds);
        counter!(
            "pulse_tasks_failed_total",
            "kind" => kind.as_str(),
            "error" => error_kind
        )
        .increment(1);

        debug!(
            task.kind = kind.as_str(),
            error.kind = error_kind,
            "Task failure recorded"
        );
    }

    // Dispatcher metrics

    pub fn update_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }

    pub fn update_active_tasks(&self, active: usize) {
        self.active_tasks.set(active as f64);
    }

    pub fn record_scan(&self, duration_seconds: f64, enqueued: usize) {
        self.scan_duration.record(duration_seconds);
        counter!("pulse_scan_enqueued_total").increment(enqueued as u64);
    }

    // Cache metrics

    pub fn record_cache_hit(&self) {
        self.cache_hits_total.increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses_total.increment(1);
    }

    pub fn update_cache_size(&self, size: usize) {
        self.cache_size.set(size as f64);
    }

    // Alert metrics

    pub fn record_alert_emitted(&self, severity: AlertSeverity) {
        counter!("pulse_alerts_emitted_total", "severity" => severity.as_str()).increment(1);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = MetricsCollector::new();
        metrics.record_task_enqueued(TaskKind::HealthCalculation);
        metrics.record_task_completed(TaskKind::TrendAnalysis, 0.25);
        metrics.record_task_failed(TaskKind::ForecastUpdate, "timeout", 60.0);
        metrics.update_queue_depth(3);
        metrics.update_cache_size(10);
        metrics.record_alert_emitted(AlertSeverity::Critical);
    }
}
