use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ForecastMetric;

/// 趋势方向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

/// 趋势分析结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// recent_average - previous_average
    pub change: f64,
    pub recent_average: f64,
    pub previous_average: f64,
}

impl TrendResult {
    pub fn insufficient_data() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            change: 0.0,
            recent_average: 0.0,
            previous_average: 0.0,
        }
    }
}

/// 预测结果来源
///
/// `Baseline` 表示没有足够的历史数据，数值只是基线估计。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    Model,
    Baseline,
}

/// 预测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub metric: ForecastMetric,
    pub source: ForecastSource,
    /// 每个未来周期一个预测值
    pub values: Vec<f64>,
    pub predicted_growth: f64,
    pub confidence: f64,
    pub risk_score: f64,
    pub best_case: Vec<f64>,
    pub worst_case: Vec<f64>,
    pub insights: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ForecastResult {
    pub fn is_baseline(&self) -> bool {
        self.source == ForecastSource::Baseline
    }
}
