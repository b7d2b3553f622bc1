//! 健康度评分
//!
//! 由六个分项得分按权重合成总分。每个分项由一组业务比率推导，
//! 权重和状态阈值来自 [`ScoringConfig`]。

use chrono::{DateTime, Utc};
use pulse_core::config::ScoringConfig;
use pulse_core::models::{
    Component, ComponentScores, HealthIssue, HealthScoreResult, HealthStatus, KeyMetrics,
    RawMetrics,
};
use pulse_core::{PulseError, PulseResult};

use crate::{clamp_score, ratio, round2};

/// 转化率达到该值记满分
const TARGET_CONVERSION_RATE: f64 = 0.3;
/// 每个活跃顾问预约数达到该值记满分
const TARGET_APPOINTMENTS_PER_AGENT: f64 = 20.0;
/// 商机渗透率达到该值记满分
const TARGET_PENETRATION_RATE: f64 = 0.25;
/// 数据在该时长内视为新鲜
const FRESH_DATA_HOURS: f64 = 24.0;
/// 超过新鲜期后再过该时长，新鲜度降为0
const FRESHNESS_DECAY_HOURS: f64 = 144.0;

#[derive(Debug, Clone)]
pub struct HealthScorer {
    config: ScoringConfig,
}

impl HealthScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// 计算健康度
    ///
    /// `previous_score` 为该门店最近一次持久化的总分，首次计算传 `None`。
    pub fn score(
        &self,
        metrics: &RawMetrics,
        previous_score: Option<f64>,
        computed_at: DateTime<Utc>,
    ) -> PulseResult<HealthScoreResult> {
        validate_metrics(metrics)?;

        let key_metrics = derive_key_metrics(metrics);
        let components = ComponentScores {
            financial: financial_score(metrics, &key_metrics),
            operational: operational_score(metrics, &key_metrics),
            team: team_score(metrics, &key_metrics),
            customer: customer_score(metrics, &key_metrics),
            market: market_score(metrics, &key_metrics),
            technology: technology_score(metrics),
        };

        let overall_score = self.overall_score(&components);
        let score_change = score_change(overall_score, previous_score);
        let mut issues = self.collect_issues(&components, &key_metrics);
        let primary_issue = if issues.is_empty() {
            None
        } else {
            Some(issues.remove(0))
        };

        let min_component = components
            .iter()
            .map(|(_, score)| score)
            .fold(f64::INFINITY, f64::min);

        Ok(HealthScoreResult {
            location_id: metrics.location_id.clone(),
            overall_score,
            status: self.status_for(overall_score),
            components,
            score_change,
            confidence: confidence(metrics),
            primary_issue,
            secondary_issues: issues,
            risk_score: risk_score(overall_score, min_component, score_change),
            growth_opportunity: growth_opportunity(overall_score, &key_metrics),
            key_metrics,
            computed_at,
        })
    }

    /// 按权重合成总分，结果限制在 [0, 100]
    pub fn overall_score(&self, components: &ComponentScores) -> f64 {
        let weighted: f64 = components
            .iter()
            .map(|(component, score)| self.config.weights.get(component) * score)
            .sum();
        round2(clamp_score(weighted))
    }

    pub fn status_for(&self, score: f64) -> HealthStatus {
        if score >= self.config.healthy_threshold {
            HealthStatus::Healthy
        } else if score >= self.config.warning_threshold {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        }
    }

    /// 低于问题阈值的分项，按得分从低到高排列
    fn collect_issues(&self, components: &ComponentScores, key: &KeyMetrics) -> Vec<HealthIssue> {
        let mut issues: Vec<HealthIssue> = components
            .iter()
            .filter(|(_, score)| *score < self.config.issue_threshold)
            .map(|(component, score)| HealthIssue {
                component,
                score,
                description: describe_issue(component, key),
            })
            .collect();
        issues.sort_by(|a, b| a.score.total_cmp(&b.score));
        issues
    }
}

/// 评分变化百分比：`(current - previous) / previous * 100`
///
/// 没有历史结果（或历史得分为0）时为 0。
pub fn score_change(current: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(previous) if previous != 0.0 => round2((current - previous) / previous * 100.0),
        _ => 0.0,
    }
}

fn validate_metrics(metrics: &RawMetrics) -> PulseResult<()> {
    let fields = [
        ("revenue", metrics.revenue),
        ("revenue_target", metrics.revenue_target),
        ("pipeline_value", metrics.pipeline_value),
        ("avg_response_time_minutes", metrics.avg_response_time_minutes),
        ("customer_satisfaction", metrics.customer_satisfaction),
        ("automation_rate", metrics.automation_rate),
        ("data_age_hours", metrics.data_age_hours),
    ];

    for (name, value) in fields {
        if !value.is_finite() {
            return Err(PulseError::Computation(format!(
                "门店 {} 的指标 {name} 不是有效数值: {value}",
                metrics.location_id
            )));
        }
        if value < 0.0 {
            return Err(PulseError::Computation(format!(
                "门店 {} 的指标 {name} 不能为负数: {value}",
                metrics.location_id
            )));
        }
    }
    Ok(())
}

fn derive_key_metrics(m: &RawMetrics) -> KeyMetrics {
    let lead_growth_rate = if m.new_contacts_previous > 0 {
        Some(round2(
            (m.new_contacts as f64 - m.new_contacts_previous as f64)
                / m.new_contacts_previous as f64
                * 100.0,
        ))
    } else {
        None
    };

    KeyMetrics {
        revenue_achievement_rate: ratio(m.revenue, m.revenue_target),
        conversion_rate: ratio(m.won_opportunities as f64, m.total_opportunities as f64)
            .unwrap_or(0.0),
        agent_utilization: ratio(m.active_agents as f64, m.total_agents as f64).unwrap_or(0.0),
        appointment_show_rate: ratio(
            m.appointments_completed as f64,
            m.appointments_booked as f64,
        )
        .unwrap_or(0.0),
        lead_growth_rate,
        retention_rate: ratio(m.churned_customers as f64, m.total_customers as f64)
            .map(|churn| 1.0 - churn)
            .unwrap_or(0.0),
        data_age_hours: m.data_age_hours,
    }
}

fn financial_score(m: &RawMetrics, key: &KeyMetrics) -> f64 {
    // 没有营收目标时达成率按中性50分处理
    let achievement = key
        .revenue_achievement_rate
        .map(|rate| clamp_score(rate * 100.0))
        .unwrap_or(50.0);
    let closed = m.won_opportunities + m.lost_opportunities;
    let win_rate = ratio(m.won_opportunities as f64, closed as f64).unwrap_or(0.0);

    round2(clamp_score(0.7 * achievement + 0.3 * win_rate * 100.0))
}

fn operational_score(m: &RawMetrics, key: &KeyMetrics) -> f64 {
    let conversion = clamp_score(key.conversion_rate / TARGET_CONVERSION_RATE * 100.0);
    let show_rate = clamp_score(key.appointment_show_rate * 100.0);
    // 5分钟内响应记满分，之后每分钟扣2分
    let response = clamp_score(100.0 - (m.avg_response_time_minutes - 5.0).max(0.0) * 2.0);

    round2(0.4 * conversion + 0.3 * show_rate + 0.3 * response)
}

fn team_score(m: &RawMetrics, key: &KeyMetrics) -> f64 {
    let utilization = clamp_score(key.agent_utilization * 100.0);
    let productivity = ratio(m.appointments_booked as f64, m.active_agents as f64)
        .map(|per_agent| clamp_score(per_agent / TARGET_APPOINTMENTS_PER_AGENT * 100.0))
        .unwrap_or(0.0);

    round2(0.6 * utilization + 0.4 * productivity)
}

fn customer_score(m: &RawMetrics, key: &KeyMetrics) -> f64 {
    let satisfaction = clamp_score(m.customer_satisfaction / 5.0 * 100.0);
    let retention = clamp_score(key.retention_rate * 100.0);

    round2(0.5 * satisfaction + 0.5 * retention)
}

fn market_score(m: &RawMetrics, key: &KeyMetrics) -> f64 {
    let growth = clamp_score(50.0 + key.lead_growth_rate.unwrap_or(0.0));
    let penetration = ratio(m.total_opportunities as f64, m.total_contacts as f64)
        .map(|rate| clamp_score(rate / TARGET_PENETRATION_RATE * 100.0))
        .unwrap_or(0.0);

    round2(0.6 * growth + 0.4 * penetration)
}

fn technology_score(m: &RawMetrics) -> f64 {
    let coverage = ratio(m.integrations_active as f64, m.integrations_total as f64)
        .map(|rate| clamp_score(rate * 100.0))
        .unwrap_or(0.0);
    let automation = clamp_score(m.automation_rate * 100.0);

    round2(0.4 * coverage + 0.3 * automation + 0.3 * freshness(m.data_age_hours))
}

fn freshness(data_age_hours: f64) -> f64 {
    let stale_hours = (data_age_hours - FRESH_DATA_HOURS).max(0.0);
    clamp_score(100.0 - stale_hours * 100.0 / FRESHNESS_DECAY_HOURS)
}

fn confidence(m: &RawMetrics) -> f64 {
    let mut confidence = 100.0;

    let stale_hours = (m.data_age_hours - FRESH_DATA_HOURS).max(0.0);
    confidence -= (stale_hours * 0.5).min(50.0);

    let missing_inputs = [
        (m.revenue_target == 0.0, 10.0),
        (m.total_opportunities == 0, 10.0),
        (m.total_agents == 0, 10.0),
        (m.total_customers == 0, 10.0),
        (m.integrations_total == 0, 5.0),
    ];
    for (missing, penalty) in missing_inputs {
        if missing {
            confidence -= penalty;
        }
    }

    round2(clamp_score(confidence))
}

fn risk_score(overall: f64, min_component: f64, score_change: f64) -> f64 {
    let mut risk = 100.0 - (0.6 * overall + 0.4 * min_component);
    if score_change < -10.0 {
        risk += 10.0;
    }
    round2(clamp_score(risk))
}

fn growth_opportunity(overall: f64, key: &KeyMetrics) -> f64 {
    let headroom = 100.0 - overall;
    let momentum = clamp_score(50.0 + key.lead_growth_rate.unwrap_or(0.0));
    round2(clamp_score(0.6 * headroom + 0.4 * momentum))
}

fn describe_issue(component: Component, key: &KeyMetrics) -> String {
    match component {
        Component::Financial => match key.revenue_achievement_rate {
            Some(rate) => format!("营收达成率 {:.0}%，低于目标", rate * 100.0),
            None => "未设置营收目标，财务表现无法评估".to_string(),
        },
        Component::Operational => format!(
            "商机转化率 {:.1}%，预约到店率 {:.0}%",
            key.conversion_rate * 100.0,
            key.appointment_show_rate * 100.0
        ),
        Component::Team => format!("顾问活跃率 {:.0}%", key.agent_utilization * 100.0),
        Component::Customer => format!("客户留存率 {:.0}%", key.retention_rate * 100.0),
        Component::Market => match key.lead_growth_rate {
            Some(rate) => format!("新线索环比变化 {rate:.1}%"),
            None => "上一周期没有新线索".to_string(),
        },
        Component::Technology => format!(
            "集成与自动化覆盖不足，数据已 {:.0} 小时未更新",
            key.data_age_hours
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::healthy_metrics;

    fn scorer() -> HealthScorer {
        HealthScorer::new(ScoringConfig::default())
    }

    #[test]
    fn test_healthy_location_scores_high() {
        let result = scorer()
            .score(&healthy_metrics("loc-1"), None, Utc::now())
            .unwrap();

        assert_eq!(result.location_id, "loc-1");
        assert!(result.overall_score >= 70.0, "score {}", result.overall_score);
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.score_change, 0.0);
        assert_eq!(result.confidence, 100.0);
        assert!(result.primary_issue.is_none());
        assert!(result.secondary_issues.is_empty());
    }

    #[test]
    fn test_scores_are_bounded() {
        let mut metrics = healthy_metrics("loc-1");
        metrics.revenue = metrics.revenue_target * 10.0;
        metrics.new_contacts = metrics.new_contacts_previous * 20;
        metrics.customer_satisfaction = 50.0;

        let result = scorer().score(&metrics, None, Utc::now()).unwrap();
        assert!((0.0..=100.0).contains(&result.overall_score));
        for (_, score) in result.components.iter() {
            assert!((0.0..=100.0).contains(&score));
        }
        assert!((0.0..=100.0).contains(&result.risk_score));
        assert!((0.0..=100.0).contains(&result.growth_opportunity));
    }

    #[test]
    fn test_empty_metrics_are_critical_with_issues() {
        let metrics = RawMetrics {
            location_id: "empty".to_string(),
            ..RawMetrics::default()
        };
        let result = scorer().score(&metrics, None, Utc::now()).unwrap();

        assert_eq!(result.status, HealthStatus::Critical);
        let primary = result.primary_issue.expect("应当有主要问题");
        for issue in &result.secondary_issues {
            assert!(issue.score >= primary.score);
        }
        assert!(result.confidence < 100.0);
    }

    #[test]
    fn test_score_change() {
        assert_eq!(score_change(80.0, None), 0.0);
        assert_eq!(score_change(80.0, Some(0.0)), 0.0);
        assert_eq!(score_change(60.0, Some(50.0)), 20.0);
        assert_eq!(score_change(40.0, Some(50.0)), -20.0);
    }

    #[test]
    fn test_previous_score_feeds_change() {
        let result = scorer()
            .score(&healthy_metrics("loc-1"), Some(50.0), Utc::now())
            .unwrap();
        let expected = round2((result.overall_score - 50.0) / 50.0 * 100.0);
        assert_eq!(result.score_change, expected);
    }

    #[test]
    fn test_status_thresholds() {
        let scorer = scorer();
        assert_eq!(scorer.status_for(70.0), HealthStatus::Healthy);
        assert_eq!(scorer.status_for(69.99), HealthStatus::Warning);
        assert_eq!(scorer.status_for(40.0), HealthStatus::Warning);
        assert_eq!(scorer.status_for(39.99), HealthStatus::Critical);
    }

    #[test]
    fn test_weights_drive_overall_score() {
        let config = ScoringConfig {
            weights: pulse_core::config::ScoringWeights {
                financial: 1.0,
                operational: 0.0,
                team: 0.0,
                customer: 0.0,
                market: 0.0,
                technology: 0.0,
            },
            ..ScoringConfig::default()
        };
        let components = ComponentScores {
            financial: 42.0,
            operational: 100.0,
            ..ComponentScores::default()
        };
        assert_eq!(HealthScorer::new(config).overall_score(&components), 42.0);
    }

    #[test]
    fn test_invalid_metrics_rejected() {
        let mut metrics = healthy_metrics("loc-1");
        metrics.revenue = f64::NAN;
        let err = scorer().score(&metrics, None, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "computation");

        let mut metrics = healthy_metrics("loc-1");
        metrics.data_age_hours = -1.0;
        assert!(scorer().score(&metrics, None, Utc::now()).is_err());
    }

    #[test]
    fn test_stale_data_lowers_confidence() {
        let mut metrics = healthy_metrics("loc-1");
        metrics.data_age_hours = 48.0;
        let result = scorer().score(&metrics, None, Utc::now()).unwrap();
        assert_eq!(result.confidence, 88.0);
    }

    #[test]
    fn test_key_metrics_without_targets() {
        let mut metrics = healthy_metrics("loc-1");
        metrics.revenue_target = 0.0;
        metrics.new_contacts_previous = 0;
        let result = scorer().score(&metrics, None, Utc::now()).unwrap();
        assert_eq!(result.key_metrics.revenue_achievement_rate, None);
        assert_eq!(result.key_metrics.lead_growth_rate, None);
    }
}
