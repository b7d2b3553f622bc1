use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 健康度评分结果
///
/// 每次计算都生成新的结果，不会被修改；更新的结果以更晚的时间戳取代旧结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreResult {
    pub location_id: String,
    /// 0-100
    pub overall_score: f64,
    pub status: HealthStatus,
    pub components: ComponentScores,
    /// 相对上一次结果的变化百分比，首次计算为 0
    pub score_change: f64,
    /// 0-100
    pub confidence: f64,
    pub primary_issue: Option<HealthIssue>,
    pub secondary_issues: Vec<HealthIssue>,
    /// 0-100
    pub risk_score: f64,
    /// 0-100
    pub growth_opportunity: f64,
    pub key_metrics: KeyMetrics,
    pub computed_at: DateTime<Utc>,
}

/// 健康状态分档
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 六个维度的分项得分，均为 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub financial: f64,
    pub operational: f64,
    pub team: f64,
    pub customer: f64,
    pub market: f64,
    pub technology: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Financial,
    Operational,
    Team,
    Customer,
    Market,
    Technology,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::Financial,
        Component::Operational,
        Component::Team,
        Component::Customer,
        Component::Market,
        Component::Technology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Financial => "financial",
            Component::Operational => "operational",
            Component::Team => "team",
            Component::Customer => "customer",
            Component::Market => "market",
            Component::Technology => "technology",
        }
    }
}

impl ComponentScores {
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

    pub fn iter(&self) -> impl Iterator<Item = (Component, f64)> + '_ {
        Component::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

/// 评分问题描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIssue {
    pub component: Component,
    pub score: f64,
    pub description: String,
}

/// 评分时派生的关键比率
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    /// revenue / revenue_target，没有营收目标时为 `None`
    pub revenue_achievement_rate: Option<f64>,
    pub conversion_rate: f64,
    pub agent_utilization: f64,
    pub appointment_show_rate: f64,
    /// 新线索环比变化百分比，上一周期没有线索时为 `None`
    pub lead_growth_rate: Option<f64>,
    pub retention_rate: f64,
    pub data_age_hours: f64,
}

/// 历史评分快照，按时间正序返回
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub score: f64,
    pub computed_at: DateTime<Utc>,
}
