use chrono::{DateTime, Utc};
use pulse_core::config::{ScoringConfig, TrendConfig};
use pulse_core::models::{
    Alert, ForecastMetric, ForecastResult, HealthScoreResult, RawMetrics, TrendResult,
};
use pulse_core::PulseResult;
use rand::Rng;

use crate::{analyze_trend, AlertEvaluator, Forecaster, HealthScorer};

/// 评分管道
///
/// 把评分、趋势、预测、告警四个纯计算步骤按同一份 [`ScoringConfig`] 组装起来，
/// 供任务处理器共享。
#[derive(Debug)]
pub struct ScoringPipeline {
    scorer: HealthScorer,
    trend: TrendConfig,
    forecaster: Forecaster,
    alerts: AlertEvaluator,
}

impl ScoringPipeline {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            trend: config.trend,
            forecaster: Forecaster::new(config.forecast),
            scorer: HealthScorer::new(config),
            alerts: AlertEvaluator::default_rules(),
        }
    }

    /// 替换默认告警规则
    pub fn with_alert_evaluator(mut self, alerts: AlertEvaluator) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn scorer(&self) -> &HealthScorer {
        &self.scorer
    }

    pub fn forecaster(&self) -> &Forecaster {
        &self.forecaster
    }

    pub fn score(
        &self,
        metrics: &RawMetrics,
        previous_score: Option<f64>,
        computed_at: DateTime<Utc>,
    ) -> PulseResult<HealthScoreResult> {
        self.scorer.score(metrics, previous_score, computed_at)
    }

    pub fn trend(&self, scores: &[f64]) -> TrendResult {
        analyze_trend(scores, &self.trend)
    }

    pub fn forecast<R: Rng + ?Sized>(
        &self,
        metric: ForecastMetric,
        history: &[f64],
        period: usize,
        rng: &mut R,
        generated_at: DateTime<Utc>,
    ) -> PulseResult<ForecastResult> {
        self.forecaster
            .forecast(metric, history, period, rng, generated_at)
    }

    pub fn alerts(&self, result: &HealthScoreResult, created_at: DateTime<Utc>) -> Vec<Alert> {
        self.alerts.evaluate(result, created_at)
    }
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
