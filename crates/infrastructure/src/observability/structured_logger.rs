//! Structured logging utilities
//!
//! Canonical events emitted by the engine. Field names are stable so log
//! pipelines can filter on `event`, `task.id`, `task.kind` and `location.id`.

use pulse_core::models::{Alert, ProcessingTask};
use pulse_core::PulseError;
use tracing::{debug, info, warn};

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log task enqueued
    pub fn log_task_enqueued(task: &ProcessingTask, queue_length: usize) {
        debug!(
            event = "task_enqueued",
            task.id = %task.id,
            task.kind = task.kind.as_str(),
            task.priority = task.priority.as_str(),
            location.id = %task.target_id,
            queue.length = queue_length,
            "Task enqueued"
        );
    }

    /// Log task skipped because the same (location, kind) is already in flight
    pub fn log_task_deduplicated(task: &ProcessingTask) {
        debug!(
            event = "task_deduplicated",
            task.kind = task.kind.as_str(),
            location.id = %task.target_id,
            "Task already in flight, skipped"
        );
    }

    /// Log task execution start
    pub fn log_task_started(task: &ProcessingTask, active_count: usize) {
        debug!(
            event = "task_started",
            task.id = %task.id,
            task.kind = task.kind.as_str(),
            location.id = %task.target_id,
            dispatcher.active = active_count,
            "Task execution started"
        );
    }

    /// Log task execution completion
    pub fn log_task_completed(task: &ProcessingTask, duration_ms: u64) {
        info!(
            event = "task_completed",
            task.id = %task.id,
            task.kind = task.kind.as_str(),
            location.id = %task.target_id,
            task.duration_ms = duration_ms,
            "Task execution completed"
        );
    }

    /// Log task failure. Missing data is expected and logged at a lower level.
    pub fn log_task_failed(task: &ProcessingTask, error: &PulseError, duration_ms: u64) {
        if error.is_data_unavailable() {
            info!(
                event = "task_failed",
                task.id = %task.id,
                task.kind = task.kind.as_str(),
                location.id = %task.target_id,
                task.duration_ms = duration_ms,
                error.kind = error.kind(),
                "No metrics available, task skipped"
            );
        } else {
            warn!(
                event = "task_failed",
                task.id = %task.id,
                task.kind = task.kind.as_str(),
                location.id = %task.target_id,
                task.duration_ms = duration_ms,
                error.kind = error.kind(),
                error.message = %error,
                "Task execution failed"
            );
        }
    }

    /// Log staleness scan summary
    pub fn log_scan_finished(known: usize, stale: usize, enqueued: usize, duration_ms: u64) {
        info!(
            event = "scan_finished",
            scan.known_locations = known,
            scan.stale_locations = stale,
            scan.enqueued = enqueued,
            scan.duration_ms = duration_ms,
            "Staleness scan finished"
        );
    }

    /// Log cache sweep
    pub fn log_cache_swept(removed: usize, remaining: usize) {
        debug!(
            event = "cache_swept",
            cache.removed = removed,
            cache.remaining = remaining,
            "Expired cache entries swept"
        );
    }

    /// Log alert emitted
    pub fn log_alert_emitted(alert: &Alert) {
        info!(
            event = "alert_emitted",
            location.id = %alert.target_id,
            alert.type = alert.alert_type.as_str(),
            alert.severity = alert.severity.as_str(),
            alert.metric = %alert.metric,
            alert.value = alert.value,
            alert.threshold = alert.threshold,
            "{}",
            alert.message
        );
    }

    /// Log a persistence failure that did not stop the task from caching its result
    pub fn log_persistence_degraded(location_id: &str, error: &PulseError) {
        warn!(
            event = "persistence_degraded",
            location.id = location_id,
            error.message = %error,
            "Result cached but not persisted"
        );
    }
}
