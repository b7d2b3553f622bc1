//! 指标预测
//!
//! 历史数据充足时用最小二乘直线外推，并把每个预测值限制在最新实际值的阻尼区间内；
//! 数据不足时退回基线估计。基线估计只是为了让界面始终有数字可展示，
//! 结果的 `source` 标记为 [`ForecastSource::Baseline`]，调用方应当把它视为“无数据”信号。

use chrono::{DateTime, Utc};
use pulse_core::config::ForecastConfig;
use pulse_core::models::{ForecastMetric, ForecastResult, ForecastSource};
use pulse_core::{PulseError, PulseResult};
use rand::Rng;

use crate::{clamp_score, mean, round2};

/// 基线估计的固定置信度
const BASELINE_CONFIDENCE: f64 = 60.0;
/// 基线估计的固定风险分
const BASELINE_RISK: f64 = 40.0;
/// 基线估计的乐观/悲观区间
const BASELINE_BAND: f64 = 0.15;
/// 计算增长率时参照的最近实际值个数
const RECENT_WINDOW: usize = 7;
/// 95% 预测区间
const Z_95: f64 = 1.96;

/// 普通最小二乘拟合 `value = slope * index + intercept`
///
/// 返回 `(slope, intercept)`；少于2个点时斜率为0，截距为均值。
pub fn linear_regression(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.len() < 2 {
        return (0.0, mean(values));
    }

    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(values);

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }

    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}

#[derive(Debug, Clone)]
pub struct Forecaster {
    config: ForecastConfig,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// 是否有足够的历史数据走回归模型
    pub fn has_enough_history(&self, history: &[f64]) -> bool {
        let nonzero = history.iter().filter(|v| **v != 0.0).count();
        history.len() >= self.config.min_points && nonzero >= self.config.min_nonzero_points
    }

    /// 预测未来 `period` 个周期
    ///
    /// `history` 按时间正序排列。数据不足时返回基线估计，`rng` 只在该路径上使用。
    /// 历史中出现 NaN 或无穷值时返回 [`PulseError::Computation`]。
    pub fn forecast<R: Rng + ?Sized>(
        &self,
        metric: ForecastMetric,
        history: &[f64],
        period: usize,
        rng: &mut R,
        generated_at: DateTime<Utc>,
    ) -> PulseResult<ForecastResult> {
        if let Some((index, value)) = history.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(PulseError::Computation(format!(
                "{}历史第 {index} 个值不是有效数值: {value}",
                metric_label(metric)
            )));
        }

        if !self.has_enough_history(history) {
            return Ok(self.baseline(metric, period, rng, generated_at));
        }

        let n = history.len();
        let (slope, intercept) = linear_regression(history);
        let current = history[n - 1];

        let bound_a = current + current * self.config.dampening_lower;
        let bound_b = current + current * self.config.dampening_upper;
        let (lower, upper) = (bound_a.min(bound_b), bound_a.max(bound_b));

        let mut dampened = false;
        let values: Vec<f64> = (0..period)
            .map(|step| {
                let raw = slope * (n + step) as f64 + intercept;
                let clamped = raw.clamp(lower, upper);
                if clamped != raw {
                    dampened = true;
                }
                clamped.max(0.0).round()
            })
            .collect();

        let rse = residual_standard_error(history, slope, intercept);
        let recent_average = mean(&history[n.saturating_sub(RECENT_WINDOW)..]);

        let confidence = if recent_average > 0.0 {
            round2(clamp_score(100.0 - rse / recent_average * 100.0))
        } else {
            0.0
        };

        let predicted_growth = if recent_average != 0.0 {
            round2((mean(&values) - recent_average) / recent_average * 100.0)
        } else {
            0.0
        };

        let volatility = if recent_average > 0.0 {
            rse / recent_average
        } else {
            1.0
        };
        let risk_score = round2(clamp_score(
            volatility * 150.0 + (-predicted_growth).max(0.0),
        ));

        let (best_case, worst_case) = prediction_bands(&values, rse, n);

        let mut insights = vec![growth_insight(metric, predicted_growth, period)];
        if dampened {
            insights.push("部分预测值受阻尼限制，原始趋势更为陡峭".to_string());
        }
        if confidence < 50.0 {
            insights.push("历史数据波动较大，预测置信度较低".to_string());
        }

        Ok(ForecastResult {
            metric,
            source: ForecastSource::Model,
            values,
            predicted_growth,
            confidence,
            risk_score,
            best_case,
            worst_case,
            insights,
            generated_at,
        })
    }

    /// 基线估计：固定基线值加有界随机扰动和小幅线性上升
    pub fn baseline<R: Rng + ?Sized>(
        &self,
        metric: ForecastMetric,
        period: usize,
        rng: &mut R,
        generated_at: DateTime<Utc>,
    ) -> ForecastResult {
        let base = metric.baseline_value();
        let noise = self.config.baseline_noise;

        let values: Vec<f64> = (0..period)
            .map(|step| {
                let trend = 1.0 + self.config.baseline_trend * (step + 1) as f64;
                let jitter = 1.0 + rng.random_range(-noise..=noise);
                (base * trend * jitter).max(0.0).round()
            })
            .collect();

        let predicted_growth = round2((mean(&values) - base) / base * 100.0);
        let best_case = values
            .iter()
            .map(|v| (v * (1.0 + BASELINE_BAND)).round())
            .collect();
        let worst_case = values
            .iter()
            .map(|v| (v * (1.0 - BASELINE_BAND)).max(0.0).round())
            .collect();

        ForecastResult {
            metric,
            source: ForecastSource::Baseline,
            values,
            predicted_growth,
            confidence: BASELINE_CONFIDENCE,
            risk_score: BASELINE_RISK,
            best_case,
            worst_case,
            insights: vec![format!(
                "{}历史数据不足，以下为基线估计，不代表实际走势",
                metric_label(metric)
            )],
            generated_at,
        }
    }
}

fn residual_standard_error(history: &[f64], slope: f64, intercept: f64) -> f64 {
    if history.len() <= 2 {
        return 0.0;
    }
    let ssr: f64 = history
        .iter()
        .enumerate()
        .map(|(i, y)| {
            let residual = y - (slope * i as f64 + intercept);
            residual * residual
        })
        .sum();
    (ssr / (history.len() - 2) as f64).sqrt()
}

/// 区间随预测距离变宽
fn prediction_bands(values: &[f64], rse: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
    values
        .iter()
        .enumerate()
        .map(|(step, value)| {
            let margin = Z_95 * rse * (1.0 + (step + 1) as f64 / n as f64).sqrt();
            ((value + margin).round(), (value - margin).max(0.0).round())
        })
        .unzip()
}

fn metric_label(metric: ForecastMetric) -> &'static str {
    match metric {
        ForecastMetric::Revenue => "营收",
        ForecastMetric::Leads => "线索",
        ForecastMetric::HealthScore => "健康度",
    }
}

fn growth_insight(metric: ForecastMetric, growth: f64, period: usize) -> String {
    let label = metric_label(metric);
    if growth > 5.0 {
        format!("预计{label}在未来{period}个周期增长 {growth:.1}%")
    } else if growth < -5.0 {
        format!("预计{label}在未来{period}个周期下降 {:.1}%", -growth)
    } else {
        format!("预计{label}在未来{period}个周期保持平稳")
    }
}
