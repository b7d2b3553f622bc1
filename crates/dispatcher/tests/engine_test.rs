use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use mockall::mock;
use pulse_core::config::AppConfig;
use pulse_core::models::{
    AlertSeverity, AlertType, ForecastMetric, ForecastSource, HealthScoreResult, HealthSnapshot,
    RawMetrics, TaskKind, TaskPriority, TaskStatus, TrendDirection,
};
use pulse_core::traits::{HealthRepository, MetricsGateway};
use pulse_core::{Clock, ManualClock, PulseError, PulseResult};
use pulse_dispatcher::HealthEngine;
use pulse_domain::{AlertCondition, AlertEvaluator, AlertRule};
use pulse_infrastructure::cache::forecast_cache_key;
use pulse_infrastructure::{InMemoryHealthRepository, InMemoryMetricsGateway};
use serde_json::json;

mock! {
    pub Gateway {}

    #[async_trait]
    impl MetricsGateway for Gateway {
        async fn fetch_metrics(&self, location_id: &str) -> PulseResult<Option<RawMetrics>>;
        async fn fetch_metric_history(
            &self,
            location_id: &str,
            metric: ForecastMetric,
            days: usize,
        ) -> PulseResult<Vec<f64>>;
    }
}

struct Harness {
    engine: HealthEngine,
    gateway: InMemoryMetricsGateway,
    repository: InMemoryHealthRepository,
    clock: ManualClock,
}

fn harness_with(config: AppConfig) -> Harness {
    let gateway = InMemoryMetricsGateway::new();
    let repository = InMemoryHealthRepository::new();
    let clock = ManualClock::new(Utc::now());

    let engine = HealthEngine::builder(Arc::new(gateway.clone()), Arc::new(repository.clone()))
        .config(config)
        .clock(Arc::new(clock.clone()))
        .rng_seed(42)
        .build()
        .unwrap();

    Harness {
        engine,
        gateway,
        repository,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(AppConfig::default())
}

/// 客户留存率低于97%即告警的自定义规则
struct RetentionRule;

impl AlertRule for RetentionRule {
    fn name(&self) -> &'static str {
        "retention"
    }

    fn evaluate(&self, result: &HealthScoreResult) -> Option<AlertCondition> {
        let value = result.key_metrics.retention_rate;
        (value < 0.97).then(|| AlertCondition {
            alert_type: AlertType::ScoreDrop,
            severity: AlertSeverity::Low,
            message: format!("客户留存率 {:.1}% 低于 97%", value * 100.0),
            metric: "retention_rate".to_string(),
            value,
            threshold: 0.97,
        })
    }
}

/// 营收只完成目标一半的门店
fn underperforming_metrics(location_id: &str) -> RawMetrics {
    RawMetrics {
        location_id: location_id.to_string(),
        total_contacts: 400,
        new_contacts: 120,
        new_contacts_previous: 100,
        total_opportunities: 100,
        won_opportunities: 30,
        lost_opportunities: 10,
        open_opportunities: 60,
        revenue: 50_000.0,
        revenue_target: 100_000.0,
        pipeline_value: 250_000.0,
        total_agents: 10,
        active_agents: 9,
        appointments_booked: 200,
        appointments_completed: 180,
        avg_response_time_minutes: 8.0,
        customer_satisfaction: 4.5,
        total_customers: 500,
        churned_customers: 25,
        integrations_active: 5,
        integrations_total: 5,
        automation_rate: 0.8,
        data_age_hours: 2.0,
    }
}

#[tokio::test]
async fn test_health_calculation_persists_caches_and_alerts() {
    let h = harness();
    h.gateway.insert_metrics(underperforming_metrics("loc-1"));

    let id = h
        .engine
        .enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::High);
    h.engine.wait_until_idle().await;

    assert_eq!(h.engine.task(id).unwrap().status, TaskStatus::Completed);

    let persisted = h.repository.latest_result("loc-1").unwrap();
    assert_eq!(persisted.score_change, 0.0);
    assert!((0.0..=100.0).contains(&persisted.overall_score));

    let cached = h.engine.cached_health("loc-1").unwrap().unwrap();
    assert_eq!(cached, persisted);

    let alerts = h.repository.alerts_for("loc-1");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::RevenueShortfall);
}

#[tokio::test]
async fn test_second_run_reports_score_change() {
    let h = harness();
    h.gateway.insert_metrics(underperforming_metrics("loc-1"));

    h.engine
        .enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::High);
    h.engine.wait_until_idle().await;
    let first = h.repository.latest_result("loc-1").unwrap();

    let mut better = underperforming_metrics("loc-1");
    better.revenue = 100_000.0;
    h.gateway.insert_metrics(better);
    h.clock.advance(ChronoDuration::minutes(5));

    h.engine
        .enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::High);
    h.engine.wait_until_idle().await;
    let second = h.repository.latest_result("loc-1").unwrap();

    assert!(second.overall_score > first.overall_score);
    let expected =
        (second.overall_score - first.overall_score) / first.overall_score * 100.0;
    assert!((second.score_change - expected).abs() < 0.01);
}

#[tokio::test]
async fn test_missing_metrics_fail_without_side_effects() {
    let h = harness();

    let id = h
        .engine
        .enqueue(TaskKind::HealthCalculation, "ghost", TaskPriority::Medium);
    h.engine.wait_until_idle().await;

    let task = h.engine.task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("ghost"));
    assert!(h.repository.latest_result("ghost").is_none());
    assert!(h.engine.cached_health("ghost").unwrap().is_none());
    assert!(h.repository.alerts().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_still_caches_result() {
    let h = harness();
    h.gateway.insert_metrics(underperforming_metrics("loc-1"));
    h.repository.set_fail_writes(true);

    let id = h
        .engine
        .enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::Medium);
    h.engine.wait_until_idle().await;

    let task = h.engine.task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(h.repository.latest_result("loc-1").is_none());
    assert!(h.engine.cached_health("loc-1").unwrap().is_some());
}

#[tokio::test]
async fn test_scan_enqueues_stale_locations_once() {
    let h = harness();
    let now = h.clock.now();

    h.repository.add_location("never");
    h.repository.seed_history(
        "fresh",
        [HealthSnapshot {
            score: 80.0,
            computed_at: now - ChronoDuration::hours(1),
        }],
    );
    h.repository.seed_history(
        "stale",
        [HealthSnapshot {
            score: 60.0,
            computed_at: now - ChronoDuration::hours(3),
        }],
    );
    for id in ["never", "fresh", "stale"] {
        h.gateway.insert_metrics(underperforming_metrics(id));
    }

    let report = h.engine.run_scan().await.unwrap();
    assert_eq!(report.known_locations, 3);
    assert_eq!(report.stale_locations, 2);
    assert_eq!(report.enqueued, 2);

    // 任务仍在队列中，再次扫描不会重复入队
    let again = h.engine.run_scan().await.unwrap();
    assert_eq!(again.enqueued, 0);
    assert_eq!(again.skipped_in_flight, 2);

    h.engine.wait_until_idle().await;
    assert!(h.repository.latest_result("never").is_some());
    assert!(h.repository.latest_result("stale").is_some());
    assert!(h.repository.latest_result("fresh").is_none());

    h.clock.advance(ChronoDuration::minutes(1));
    let after = h.engine.run_scan().await.unwrap();
    assert_eq!(after.stale_locations, 0);
    assert_eq!(h.engine.stats().completed, 2);
}

#[tokio::test]
async fn test_cache_expiry_and_sweep_update_status() {
    let h = harness();
    let cache = h.engine.cache();

    cache.set("a", json!(1), Duration::from_millis(1000));
    assert_eq!(h.engine.get_cached("a"), Some(json!(1)));
    assert_eq!(h.engine.cache_entry("a").unwrap().access_count, 1);
    assert_eq!(h.engine.status().cache_size, 1);

    h.clock.advance(ChronoDuration::milliseconds(1001));
    assert_eq!(h.engine.status().cache_size, 1);
    assert_eq!(h.engine.sweep_cache(), 1);
    assert_eq!(h.engine.status().cache_size, 0);
    assert_eq!(h.engine.get_cached("a"), None);
}

#[tokio::test]
async fn test_invalidate() {
    let h = harness();
    h.engine
        .cache()
        .set("health:loc-1", json!({"x": 1}), Duration::from_secs(60));
    assert!(h.engine.invalidate("health:loc-1"));
    assert!(h.engine.get_cached("health:loc-1").is_none());
}

#[tokio::test]
async fn test_trend_and_forecast_tasks_populate_cache() {
    let mut config = AppConfig::default();
    config.engine.forecast_period = 5;
    let h = harness_with(config);
    let now = h.clock.now();

    h.repository.seed_history(
        "loc-1",
        (0..14).map(|day| HealthSnapshot {
            score: if day < 7 { 60.0 } else { 70.0 },
            computed_at: now - ChronoDuration::days(14 - day),
        }),
    );
    h.gateway.set_history(
        "loc-1",
        ForecastMetric::Revenue,
        (0..20).map(|i| 1000.0 + 100.0 * i as f64).collect(),
    );

    h.engine
        .enqueue(TaskKind::TrendAnalysis, "loc-1", TaskPriority::Medium);
    h.engine
        .enqueue(TaskKind::ForecastUpdate, "loc-1", TaskPriority::Medium);
    h.engine.wait_until_idle().await;
    assert_eq!(h.engine.stats().completed, 2);

    let trend = h.engine.cached_trend("loc-1").unwrap().unwrap();
    assert_eq!(trend.direction, TrendDirection::Improving);
    assert_eq!(trend.change, 10.0);

    let revenue = h.engine.forecast_or_baseline("loc-1", ForecastMetric::Revenue);
    assert_eq!(revenue.source, ForecastSource::Model);
    assert_eq!(revenue.values, vec![3000.0, 3100.0, 3200.0, 3300.0, 3400.0]);

    // 线索没有历史，缓存的是基线估计
    let leads = h.engine.forecast_or_baseline("loc-1", ForecastMetric::Leads);
    assert_eq!(leads.source, ForecastSource::Baseline);
    assert_eq!(leads.values.len(), 5);
}

#[tokio::test]
async fn test_forecast_falls_back_to_baseline_without_computation() {
    let h = harness();
    let forecast = h.engine.forecast_or_baseline("unknown", ForecastMetric::Revenue);
    assert!(forecast.is_baseline());
    assert_eq!(forecast.confidence, 60.0);
    assert_eq!(forecast.risk_score, 40.0);
    assert_eq!(forecast.values.len(), 30);
}

#[tokio::test]
async fn test_alert_check_prefers_cached_result() {
    let h = harness();
    h.gateway.insert_metrics(underperforming_metrics("loc-1"));
    h.engine
        .enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::High);
    h.engine.wait_until_idle().await;
    assert_eq!(h.repository.alerts().len(), 1);

    // 网关没有数据，仍然可以用缓存结果检查告警
    h.gateway.remove_metrics("loc-1");
    let fetches = h.gateway.fetch_count();
    let id = h
        .engine
        .enqueue(TaskKind::AlertCheck, "loc-1", TaskPriority::High);
    h.engine.wait_until_idle().await;
    assert_eq!(h.engine.task(id).unwrap().status, TaskStatus::Completed);
    assert_eq!(h.gateway.fetch_count(), fetches);
    assert_eq!(h.repository.alerts().len(), 2);

    // 缓存失效后需要重新拉取指标，没有数据则失败
    h.engine.invalidate("health:loc-1");
    let id = h
        .engine
        .enqueue(TaskKind::AlertCheck, "loc-1", TaskPriority::High);
    h.engine.wait_until_idle().await;
    assert_eq!(h.engine.task(id).unwrap().status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_gateway_error_fails_task() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_metrics()
        .withf(|location_id| location_id == "loc-1")
        .times(1)
        .returning(|_| Err(PulseError::MetricsGateway("connection refused".into())));

    let repository = InMemoryHealthRepository::new();
    let engine = HealthEngine::builder(Arc::new(gateway), Arc::new(repository.clone()))
        .build()
        .unwrap();

    let id = engine.enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::Medium);
    engine.wait_until_idle().await;

    let task = engine.task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("connection refused"));
    assert!(repository.list_known_location_ids().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timers_scan_on_start_and_stop() {
    let h = harness();
    h.repository.add_location("loc-1");
    h.gateway.insert_metrics(underperforming_metrics("loc-1"));

    let mut timers = h.engine.start();
    assert!(timers.is_running());

    // 首次扫描在启动时触发
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.engine.wait_until_idle().await;
    assert!(h.repository.latest_result("loc-1").is_some());

    timers.stop().await;
    assert!(!timers.is_running());
    assert!(h.engine.drain(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_custom_alert_rule_reaches_repository() {
    let gateway = InMemoryMetricsGateway::new();
    let repository = InMemoryHealthRepository::new();
    gateway.insert_metrics(underperforming_metrics("loc-1"));

    let engine = HealthEngine::builder(Arc::new(gateway), Arc::new(repository.clone()))
        .with_alert_rule(RetentionRule)
        .build()
        .unwrap();

    engine.enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::High);
    engine.wait_until_idle().await;

    // 默认规则在前，自定义规则追加在后
    let alerts = repository.alerts_for("loc-1");
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].alert_type, AlertType::RevenueShortfall);
    assert_eq!(alerts[1].metric, "retention_rate");
    assert_eq!(alerts[1].severity, AlertSeverity::Low);
    assert!((alerts[1].value - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn test_alert_evaluator_replaces_default_rules() {
    let gateway = InMemoryMetricsGateway::new();
    let repository = InMemoryHealthRepository::new();
    gateway.insert_metrics(underperforming_metrics("loc-1"));

    let engine = HealthEngine::builder(Arc::new(gateway), Arc::new(repository.clone()))
        .alert_evaluator(AlertEvaluator::new().with_rule(RetentionRule))
        .build()
        .unwrap();

    engine.enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::High);
    engine.wait_until_idle().await;

    let alerts = repository.alerts_for("loc-1");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric, "retention_rate");
}

#[test]
fn test_build_rejects_invalid_config() {
    let mut config = AppConfig::default();
    config.engine.scan_interval_seconds = 0;

    let result = HealthEngine::builder(
        Arc::new(InMemoryMetricsGateway::new()),
        Arc::new(InMemoryHealthRepository::new()),
    )
    .config(config)
    .build();

    match result {
        Err(PulseError::Configuration(message)) => assert!(message.contains("扫描间隔"), "{message}"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("invalid config accepted"),
    }

    let mut config = AppConfig::default();
    config.engine.staleness_window_seconds = i64::MAX;
    let result = HealthEngine::builder(
        Arc::new(InMemoryMetricsGateway::new()),
        Arc::new(InMemoryHealthRepository::new()),
    )
    .config(config)
    .build();
    assert!(matches!(result, Err(PulseError::Configuration(_))));
}

#[tokio::test(start_paused = true)]
async fn test_scan_skips_running_task() {
    let h = harness();
    h.repository.add_location("loc-1");
    h.gateway.insert_metrics(underperforming_metrics("loc-1"));
    h.gateway.set_delay(Some(Duration::from_secs(1)));

    let report = h.engine.run_scan().await.unwrap();
    assert_eq!(report.enqueued, 1);

    // 任务已开始执行，阻塞在网关调用上
    tokio::time::sleep(Duration::from_millis(10)).await;
    let status = h.engine.status();
    assert_eq!(status.queue_length, 0);
    assert_eq!(status.active_count, 1);

    let again = h.engine.run_scan().await.unwrap();
    assert_eq!(again.stale_locations, 1);
    assert_eq!(again.enqueued, 0);
    assert_eq!(again.skipped_in_flight, 1);
    assert!(h
        .engine
        .enqueue_if_absent(TaskKind::HealthCalculation, "loc-1", TaskPriority::Critical)
        .is_none());

    h.engine.wait_until_idle().await;
    assert!(h.repository.latest_result("loc-1").is_some());
    assert_eq!(h.engine.stats().completed, 1);
    assert_eq!(h.engine.stats().deduplicated, 2);
}

#[test]
fn test_sweep_cache_dispatches_queued_tasks() {
    let h = harness();
    h.gateway.insert_metrics(underperforming_metrics("loc-1"));

    // 不在运行时中：入队和清理都不启动任务
    let id = h
        .engine
        .enqueue(TaskKind::HealthCalculation, "loc-1", TaskPriority::High);
    assert_eq!(h.engine.sweep_cache(), 0);
    assert_eq!(h.engine.task(id).unwrap().status, TaskStatus::Pending);
    assert_eq!(h.engine.status().queue_length, 1);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        h.engine.sweep_cache();
        assert_eq!(h.engine.status().queue_length, 0);
        h.engine.wait_until_idle().await;
    });

    assert_eq!(h.engine.task(id).unwrap().status, TaskStatus::Completed);
    assert!(h.repository.latest_result("loc-1").is_some());
}

#[tokio::test]
async fn test_forecast_with_non_finite_history_fails_task() {
    let h = harness();
    let mut history: Vec<f64> = (0..20).map(|i| 1000.0 + 100.0 * i as f64).collect();
    history[19] = f64::NAN;
    h.gateway.set_history("loc-1", ForecastMetric::Revenue, history);

    let id = h
        .engine
        .enqueue(TaskKind::ForecastUpdate, "loc-1", TaskPriority::Medium);
    h.engine.wait_until_idle().await;

    let task = h.engine.task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("不是有效数值"));
    assert_eq!(h.engine.stats().panicked, 0);
    assert!(h
        .engine
        .get_cached(&forecast_cache_key("loc-1", ForecastMetric::Revenue))
        .is_none());
}

#[tokio::test]
async fn test_forecast_payload_overrides_period() {
    let h = harness();
    h.gateway.set_history(
        "loc-1",
        ForecastMetric::Revenue,
        (0..20).map(|i| 1000.0 + 100.0 * i as f64).collect(),
    );

    let id = h.engine.enqueue_with_payload(
        TaskKind::ForecastUpdate,
        "loc-1",
        TaskPriority::Medium,
        json!({ "period": 3 }),
    );
    h.engine.wait_until_idle().await;

    let task = h.engine.task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.payload, Some(json!({ "period": 3 })));

    let revenue = h.engine.forecast_or_baseline("loc-1", ForecastMetric::Revenue);
    assert_eq!(revenue.values, vec![3000.0, 3100.0, 3200.0]);

    let bad = h.engine.enqueue_with_payload(
        TaskKind::ForecastUpdate,
        "loc-1",
        TaskPriority::Medium,
        json!({ "period": 0 }),
    );
    h.engine.wait_until_idle().await;
    assert_eq!(h.engine.task(bad).unwrap().status, TaskStatus::Failed);
}
