//! 任务处理器
//!
//! 按任务类型调用指标网关、评分管道和持久化层，并把结果写入缓存。

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::config::CacheConfig;
use pulse_core::models::{
    ForecastMetric, ForecastResult, HealthScoreResult, ProcessingTask, TaskKind,
};
use pulse_core::traits::{HealthRepository, MetricsGateway, TaskHandler};
use pulse_core::{Clock, PulseError, PulseResult};
use pulse_domain::ScoringPipeline;
use pulse_infrastructure::cache::{forecast_cache_key, health_cache_key, trend_cache_key};
use pulse_infrastructure::{CacheStore, StructuredLogger, TimeoutHandler};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, instrument, warn};

use crate::alert_emitter::AlertEmitter;

/// payload 可指定的最大预测周期数
const MAX_FORECAST_PERIOD: u64 = 365;

/// 处理器的可调参数
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub cache: CacheConfig,
    /// 趋势分析和健康度预测读取的历史条数，也是其他指标预测读取的天数
    pub history_limit: usize,
    pub forecast_period: usize,
}

pub struct HealthTaskProcessor {
    gateway: Arc<dyn MetricsGateway>,
    repository: Arc<dyn HealthRepository>,
    cache: Arc<CacheStore>,
    pipeline: Arc<ScoringPipeline>,
    emitter: AlertEmitter,
    timeouts: TimeoutHandler,
    clock: Arc<dyn Clock>,
    settings: ProcessorSettings,
    rng: Mutex<StdRng>,
}

impl HealthTaskProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn MetricsGateway>,
        repository: Arc<dyn HealthRepository>,
        cache: Arc<CacheStore>,
        pipeline: Arc<ScoringPipeline>,
        emitter: AlertEmitter,
        timeouts: TimeoutHandler,
        clock: Arc<dyn Clock>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            gateway,
            repository,
            cache,
            pipeline,
            emitter,
            timeouts,
            clock,
            settings,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// 固定基线估计的随机种子
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// 拉取指标并计算健康度，不写入任何地方
    pub async fn compute_health(&self, location_id: &str) -> PulseResult<HealthScoreResult> {
        let metrics = self
            .timeouts
            .gateway_operation(self.gateway.fetch_metrics(location_id), "fetch_metrics")
            .await?
            .ok_or_else(|| PulseError::DataUnavailable {
                location_id: location_id.to_string(),
            })?;

        let previous = self
            .timeouts
            .persistence_operation(self.repository.get_history(location_id, 1), "get_history")
            .await?
            .last()
            .map(|snapshot| snapshot.score);

        self.pipeline.score(&metrics, previous, self.clock.now())
    }

    #[instrument(skip(self), fields(location.id = %location_id))]
    async fn process_health(&self, location_id: &str) -> PulseResult<()> {
        let result = self.compute_health(location_id).await?;

        let persisted = self
            .timeouts
            .persistence_operation(
                self.repository
                    .upsert_health_result(location_id, &result, result.computed_at),
                "upsert_health_result",
            )
            .await;

        // 持久化失败也写缓存，进程内读取方仍能拿到最新结果
        self.cache.set_typed(
            health_cache_key(location_id),
            &result,
            ttl(self.settings.cache.health_ttl_seconds),
        )?;

        let alerts = self.pipeline.alerts(&result, self.clock.now());
        self.emitter.emit(&alerts).await;

        if let Err(e) = &persisted {
            StructuredLogger::log_persistence_degraded(location_id, e);
        }
        persisted
    }

    #[instrument(skip(self), fields(location.id = %location_id))]
    async fn process_trend(&self, location_id: &str) -> PulseResult<()> {
        let history = self
            .timeouts
            .persistence_operation(
                self.repository
                    .get_history(location_id, self.settings.history_limit),
                "get_history",
            )
            .await?;
        let scores: Vec<f64> = history.iter().map(|snapshot| snapshot.score).collect();

        let trend = self.pipeline.trend(&scores);
        debug!(trend.direction = ?trend.direction, trend.change = trend.change, "趋势分析完成");

        self.cache.set_typed(
            trend_cache_key(location_id),
            &trend,
            ttl(self.settings.cache.trend_ttl_seconds),
        )
    }

    #[instrument(skip(self), fields(location.id = %location_id))]
    async fn process_forecast(&self, location_id: &str, period: usize) -> PulseResult<()> {
        for metric in ForecastMetric::ALL {
            let history = self.metric_history(location_id, metric).await?;
            let forecast = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                self.pipeline.forecast(
                    metric,
                    &history,
                    period,
                    &mut *rng,
                    self.clock.now(),
                )
            }?;

            if forecast.is_baseline() {
                debug!(forecast.metric = metric.as_str(), "历史数据不足，使用基线估计");
            }

            self.cache.set_typed(
                forecast_cache_key(location_id, metric),
                &forecast,
                ttl(self.settings.cache.forecast_ttl_seconds),
            )?;
        }
        Ok(())
    }

    async fn metric_history(&self, location_id: &str, metric: ForecastMetric) -> PulseResult<Vec<f64>> {
        let days = self.settings.history_limit;
        match metric {
            ForecastMetric::HealthScore => {
                let history = self
                    .timeouts
                    .persistence_operation(self.repository.get_history(location_id, days), "get_history")
                    .await?;
                Ok(history.iter().map(|snapshot| snapshot.score).collect())
            }
            _ => {
                self.timeouts
                    .gateway_operation(
                        self.gateway.fetch_metric_history(location_id, metric, days),
                        "fetch_metric_history",
                    )
                    .await
            }
        }
    }

    #[instrument(skip(self), fields(location.id = %location_id))]
    async fn process_alert_check(&self, location_id: &str) -> PulseResult<()> {
        let cached = match self
            .cache
            .get_typed::<HealthScoreResult>(&health_cache_key(location_id))
        {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "缓存中的健康度结果无法解析，重新计算");
                None
            }
        };

        let result = match cached {
            Some(result) => result,
            None => self.compute_health(location_id).await?,
        };

        let alerts = self.pipeline.alerts(&result, self.clock.now());
        self.emitter.emit(&alerts).await;
        Ok(())
    }

    /// 基线估计，供没有任何成功计算的读取方使用
    pub fn baseline_forecast(&self, metric: ForecastMetric) -> ForecastResult {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.pipeline.forecaster().baseline(
            metric,
            self.settings.forecast_period,
            &mut *rng,
            self.clock.now(),
        )
    }
}

#[async_trait]
impl TaskHandler for HealthTaskProcessor {
    async fn handle(&self, task: &ProcessingTask) -> PulseResult<()> {
        let location_id = task.target_id.as_str();
        match task.kind {
            TaskKind::HealthCalculation => self.process_health(location_id).await,
            TaskKind::TrendAnalysis => self.process_trend(location_id).await,
            TaskKind::ForecastUpdate => {
                let period = forecast_period(task, self.settings.forecast_period)?;
                self.process_forecast(location_id, period).await
            }
            TaskKind::AlertCheck => self.process_alert_check(location_id).await,
        }
    }
}

/// 预测任务的 payload 可以用 `{"period": N}` 覆盖默认预测周期数
fn forecast_period(task: &ProcessingTask, default: usize) -> PulseResult<usize> {
    let Some(period) = task.payload.as_ref().and_then(|payload| payload.get("period")) else {
        return Ok(default);
    };
    match period.as_u64() {
        Some(period) if (1..=MAX_FORECAST_PERIOD).contains(&period) => Ok(period as usize),
        _ => Err(PulseError::Computation(format!(
            "任务 {} 的预测周期无效: {period}",
            task.id
        ))),
    }
}

fn ttl(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
