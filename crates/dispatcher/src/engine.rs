//! 健康度计算引擎
//!
//! 对外的唯一入口：组装缓存、分发器、处理器、扫描器和两个周期定时器。
//! 引擎是进程内库，由外部的HTTP层调用。

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use pulse_core::config::AppConfig;
use pulse_core::models::{
    ForecastMetric, ForecastResult, HealthScoreResult, ProcessingTask, TaskKind, TaskPriority,
    TrendResult,
};
use pulse_core::traits::{HealthRepository, MetricsGateway};
use pulse_core::{Clock, PulseError, PulseResult, SystemClock};
use pulse_domain::{AlertEvaluator, AlertRule, ScoringPipeline};
use pulse_infrastructure::cache::{forecast_cache_key, health_cache_key, trend_cache_key};
use pulse_infrastructure::{
    CacheEntry, CacheStats, CacheStore, MetricsCollector, StructuredLogger, TimeoutConfig,
    TimeoutHandler,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::alert_emitter::AlertEmitter;
use crate::dispatcher::{DispatcherConfig, DispatcherStats, TaskDispatcher};
use crate::processor::{HealthTaskProcessor, ProcessorSettings};
use crate::scheduler::{ScanReport, StalenessScanner};
use crate::timer::PeriodicTimer;

/// 运行状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub queue_length: usize,
    pub active_count: usize,
    pub cache_size: usize,
    pub max_concurrent: usize,
}

/// 引擎构建器
pub struct HealthEngineBuilder {
    config: AppConfig,
    gateway: Arc<dyn MetricsGateway>,
    repository: Arc<dyn HealthRepository>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
    rng_seed: Option<u64>,
    alerts: AlertEvaluator,
}

impl HealthEngineBuilder {
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// 固定基线估计的随机种子
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// 替换整套告警规则，默认使用 [`AlertEvaluator::default_rules`]
    pub fn alert_evaluator(mut self, alerts: AlertEvaluator) -> Self {
        self.alerts = alerts;
        self
    }

    /// 在现有规则之后追加一条告警规则
    pub fn with_alert_rule(mut self, rule: impl AlertRule + 'static) -> Self {
        self.alerts = self.alerts.with_rule(rule);
        self
    }

    /// 校验配置并组装引擎，配置无效时返回 [`PulseError::Configuration`]
    pub fn build(self) -> PulseResult<HealthEngine> {
        let Self {
            config,
            gateway,
            repository,
            clock,
            metrics,
            rng_seed,
            alerts,
        } = self;

        config
            .validate()
            .map_err(|e| PulseError::Configuration(format!("{e:#}")))?;

        let timeouts = TimeoutHandler::new(TimeoutConfig::from(&config.engine));
        let cache = Arc::new(CacheStore::new(Arc::clone(&clock), metrics.clone()));
        let pipeline =
            Arc::new(ScoringPipeline::new(config.scoring.clone()).with_alert_evaluator(alerts));
        let emitter = AlertEmitter::new(Arc::clone(&repository), timeouts, metrics.clone());

        let mut processor = HealthTaskProcessor::new(
            gateway,
            Arc::clone(&repository),
            Arc::clone(&cache),
            pipeline,
            emitter,
            timeouts,
            Arc::clone(&clock),
            ProcessorSettings {
                cache: config.cache.clone(),
                history_limit: config.engine.history_limit,
                forecast_period: config.engine.forecast_period,
            },
        );
        if let Some(seed) = rng_seed {
            processor = processor.with_rng_seed(seed);
        }
        let processor = Arc::new(processor);

        let dispatcher = TaskDispatcher::new(
            processor.clone(),
            Arc::clone(&clock),
            metrics.clone(),
            DispatcherConfig::from(&config.engine),
        );

        let scanner = Arc::new(StalenessScanner::new(
            repository,
            dispatcher.clone(),
            clock,
            timeouts,
            metrics,
            TimeDelta::seconds(config.engine.staleness_window_seconds),
        ));

        Ok(HealthEngine {
            config,
            cache,
            dispatcher,
            processor,
            scanner,
        })
    }
}

/// 健康度计算引擎
pub struct HealthEngine {
    config: AppConfig,
    cache: Arc<CacheStore>,
    dispatcher: TaskDispatcher,
    processor: Arc<HealthTaskProcessor>,
    scanner: Arc<StalenessScanner>,
}

/// `start` 返回的定时器句柄
pub struct EngineTimers {
    scan: PeriodicTimer,
    cache_cleanup: PeriodicTimer,
}

impl EngineTimers {
    pub fn is_running(&self) -> bool {
        self.scan.is_running() && self.cache_cleanup.is_running()
    }

    /// 停止两个定时器，不等待运行中的任务
    pub async fn stop(&mut self) {
        self.scan.stop().await;
        self.cache_cleanup.stop().await;
        info!("引擎定时器已停止");
    }
}

impl HealthEngine {
    pub fn builder(
        gateway: Arc<dyn MetricsGateway>,
        repository: Arc<dyn HealthRepository>,
    ) -> HealthEngineBuilder {
        HealthEngineBuilder {
            config: AppConfig::default(),
            gateway,
            repository,
            clock: Arc::new(SystemClock),
            metrics: MetricsCollector::new(),
            rng_seed: None,
            alerts: AlertEvaluator::default_rules(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// 启动陈旧度扫描和缓存清理定时器
    pub fn start(&self) -> EngineTimers {
        let scanner = Arc::clone(&self.scanner);
        let scan = PeriodicTimer::start(
            "staleness_scan",
            Duration::from_secs(self.config.engine.scan_interval_seconds),
            move || {
                let scanner = Arc::clone(&scanner);
                async move {
                    if let Err(e) = scanner.scan_once().await {
                        warn!(error = %e, "陈旧度扫描失败");
                    }
                }
            },
        );

        let cache = Arc::clone(&self.cache);
        let dispatcher = self.dispatcher.clone();
        let cache_cleanup = PeriodicTimer::start(
            "cache_cleanup",
            Duration::from_secs(self.config.engine.cache_cleanup_interval_seconds),
            move || {
                sweep(&cache, &dispatcher);
                async {}
            },
        );

        info!(
            max_concurrent = self.config.engine.max_concurrent_tasks,
            "健康度引擎已启动"
        );
        EngineTimers {
            scan,
            cache_cleanup,
        }
    }

    /// 强制入队一次计算，同类任务在途也会入队
    pub fn enqueue(&self, kind: TaskKind, location_id: &str, priority: TaskPriority) -> Uuid {
        self.dispatcher.enqueue(kind, location_id, priority)
    }

    /// 入队一个带输入数据的任务，例如预测任务的 `{"period": 7}`
    pub fn enqueue_with_payload(
        &self,
        kind: TaskKind,
        location_id: &str,
        priority: TaskPriority,
        payload: Value,
    ) -> Uuid {
        self.dispatcher.enqueue_with_payload(kind, location_id, priority, payload)
    }

    /// 同门店同类型任务在途时跳过
    pub fn enqueue_if_absent(
        &self,
        kind: TaskKind,
        location_id: &str,
        priority: TaskPriority,
    ) -> Option<Uuid> {
        self.dispatcher.enqueue_if_absent(kind, location_id, priority)
    }

    pub fn status(&self) -> EngineStatus {
        let load = self.dispatcher.load();
        EngineStatus {
            queue_length: load.queue_length,
            active_count: load.active_count,
            cache_size: self.cache.len(),
            max_concurrent: self.dispatcher.config().max_concurrent_tasks,
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 任务状态查询
    pub fn task(&self, id: Uuid) -> Option<ProcessingTask> {
        self.dispatcher.task(id)
    }

    pub fn get_cached(&self, key: &str) -> Option<Value> {
        self.cache.get(key)
    }

    pub fn cache_entry(&self, key: &str) -> Option<CacheEntry> {
        self.cache.peek(key)
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.invalidate(key)
    }

    pub fn cached_health(&self, location_id: &str) -> PulseResult<Option<HealthScoreResult>> {
        self.cache.get_typed(&health_cache_key(location_id))
    }

    pub fn cached_trend(&self, location_id: &str) -> PulseResult<Option<TrendResult>> {
        self.cache.get_typed(&trend_cache_key(location_id))
    }

    /// 读取缓存的预测；没有成功计算过时返回基线估计
    pub fn forecast_or_baseline(&self, location_id: &str, metric: ForecastMetric) -> ForecastResult {
        match self
            .cache
            .get_typed::<ForecastResult>(&forecast_cache_key(location_id, metric))
        {
            Ok(Some(forecast)) => forecast,
            Ok(None) => self.processor.baseline_forecast(metric),
            Err(e) => {
                warn!(location.id = location_id, error = %e, "缓存中的预测无法解析，返回基线估计");
                self.processor.baseline_forecast(metric)
            }
        }
    }

    /// 立即执行一次陈旧度扫描
    pub async fn run_scan(&self) -> PulseResult<ScanReport> {
        self.scanner.scan_once().await
    }

    /// 立即清理过期缓存并尝试分发排队任务，返回移除条目数
    pub fn sweep_cache(&self) -> usize {
        sweep(&self.cache, &self.dispatcher)
    }

    pub async fn wait_until_idle(&self) {
        self.dispatcher.wait_until_idle().await;
    }

    /// 在限定时间内等待运行中的任务结束，超时返回 `false`
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_until_idle())
            .await
            .is_ok()
    }
}

fn sweep(cache: &CacheStore, dispatcher: &TaskDispatcher) -> usize {
    let removed = cache.sweep_expired();
    StructuredLogger::log_cache_swept(removed, cache.len());
    dispatcher.dispatch_pending();
    removed
}
