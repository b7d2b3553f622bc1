//! # 评分管道
//!
//! 纯计算模块，不做任何I/O：
//!
//! - [`health`] - 六个分项得分、总分、状态分档、问题识别、评分变化
//! - [`trend`] - 近期与前期均值比较的趋势分类
//! - [`forecast`] - 最小二乘回归预测（带阻尼）和无数据时的基线估计
//! - [`alerts`] - 有序的告警规则列表
//! - [`pipeline`] - 按配置组装以上组件
//!
//! 输入只来自指标网关和持久化层读取的数据，输出交由调用方持久化和缓存。

pub mod alerts;
pub mod forecast;
pub mod health;
pub mod pipeline;
pub mod trend;

pub use alerts::{AlertCondition, AlertEvaluator, AlertRule};
pub use forecast::{linear_regression, Forecaster};
pub use health::{score_change, HealthScorer};
pub use pipeline::ScoringPipeline;
pub use trend::analyze_trend;

/// 分数限制在 [0, 100]
pub(crate) fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 分母为0时返回 `None`
pub(crate) fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
