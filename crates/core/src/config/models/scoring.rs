use serde::{Deserialize, Serialize};

use crate::models::Component;

/// 评分策略配置
///
/// 分项权重和状态阈值属于业务策略，不写死在算法里。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// 总分不低于该值为 healthy
    pub healthy_threshold: f64,
    /// 总分不低于该值为 warning，否则为 critical
    pub warning_threshold: f64,
    /// 分项低于该值记为问题
    pub issue_threshold: f64,
    pub trend: TrendConfig,
    pub forecast: ForecastConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            healthy_threshold: 70.0,
            warning_threshold: 40.0,
            issue_threshold: 60.0,
            trend: TrendConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.weights.validate()?;

        if !(0.0..=100.0).contains(&self.warning_threshold)
            || !(0.0..=100.0).contains(&self.healthy_threshold)
        {
            return Err(anyhow::anyhow!("状态阈值必须在0-100之间"));
        }

        if self.warning_threshold >= self.healthy_threshold {
            return Err(anyhow::anyhow!(
                "warning阈值({})必须小于healthy阈值({})",
                self.warning_threshold,
                self.healthy_threshold
            ));
        }

        if !(0.0..=100.0).contains(&self.issue_threshold) {
            return Err(anyhow::anyhow!("问题阈值必须在0-100之间"));
        }

        self.trend.validate()?;
        self.forecast.validate()?;
        Ok(())
    }
}

/// 六个分项的权重，总和必须为 1
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub financial: f64,
    pub operational: f64,
    pub team: f64,
    pub customer: f64,
    pub market: f64,
    pub technology: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            financial: 0.25,
            operational: 0.20,
            team: 0.15,
            customer: 0.20,
            market: 0.10,
            technology: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::Financial => self.financial,
            Component::Operational => self.operational,
            Component::Team => self.team,
            Component::Customer => self.customer,
            Component::Market => self.market,
            Component::Technology => self.technology,
        }
    }

    pub fn total(&self) -> f64 {
        Component::ALL.iter().map(|c| self.get(*c)).sum()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(c) = Component::ALL.iter().find(|c| self.get(**c) < 0.0) {
            return Err(anyhow::anyhow!("权重不能为负数: {}", c.as_str()));
        }

        let total = self.total();
        if (total - 1.0).abs() > 0.001 {
            return Err(anyhow::anyhow!("分项权重总和必须为1，当前为 {total:.3}"));
        }
        Ok(())
    }
}

/// 趋势分析参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrendConfig {
    /// 每个比较窗口的数据点数
    pub window: usize,
    /// 均值差超过该值才判定为上升/下降
    pub sensitivity: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: 7,
            sensitivity: 2.0,
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window == 0 {
            return Err(anyhow::anyhow!("趋势窗口必须大于0"));
        }
        if self.sensitivity < 0.0 {
            return Err(anyhow::anyhow!("趋势灵敏度不能为负数"));
        }
        Ok(())
    }
}

/// 预测参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForecastConfig {
    /// 使用回归模型所需的最少数据点
    pub min_points: usize,
    /// 使用回归模型所需的最少非零数据点
    pub min_nonzero_points: usize,
    /// 单周期预测相对最新实际值的下限偏移（-0.3 即不低于 70%）
    pub dampening_lower: f64,
    /// 单周期预测相对最新实际值的上限偏移（0.5 即不高于 150%）
    pub dampening_upper: f64,
    /// 基线估计的随机扰动幅度
    pub baseline_noise: f64,
    /// 基线估计每周期的上升幅度
    pub baseline_trend: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_points: 14,
            min_nonzero_points: 7,
            dampening_lower: -0.3,
            dampening_upper: 0.5,
            baseline_noise: 0.1,
            baseline_trend: 0.005,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_points < 3 {
            return Err(anyhow::anyhow!("预测最少数据点必须不小于3"));
        }
        if self.dampening_lower > 0.0 || self.dampening_upper < 0.0 {
            return Err(anyhow::anyhow!(
                "阻尼区间必须包含最新实际值: [{}, {}]",
                self.dampening_lower,
                self.dampening_upper
            ));
        }
        if !(0.0..1.0).contains(&self.baseline_noise) {
            return Err(anyhow::anyhow!("基线扰动幅度必须在[0, 1)之间"));
        }
        Ok(())
    }
}
