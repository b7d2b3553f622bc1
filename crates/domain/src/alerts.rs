//! 告警规则
//!
//! 规则按注册顺序逐条检查，每条命中的规则生成一条告警，输出顺序与规则顺序一致。

use chrono::{DateTime, Utc};
use pulse_core::models::{Alert, AlertSeverity, AlertType, HealthScoreResult};

/// 营收达成率低于该值告警（百分比）
const REVENUE_ACHIEVEMENT_THRESHOLD: f64 = 80.0;
/// 营收达成率低于该值升级为 high
const REVENUE_ACHIEVEMENT_SEVERE: f64 = 60.0;
const LOW_HEALTH_SCORE_THRESHOLD: f64 = 40.0;
/// 线索环比下降超过 15%
const LEAD_DROP_THRESHOLD: f64 = -15.0;
const STALE_DATA_HOURS: f64 = 48.0;
/// 评分相对上次下降超过 10%
const SCORE_DROP_THRESHOLD: f64 = -10.0;

/// 单条规则命中的结果，由 [`AlertEvaluator`] 补上目标和时间戳
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCondition {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
}

pub trait AlertRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, result: &HealthScoreResult) -> Option<AlertCondition>;
}

pub struct RevenueShortfallRule;

impl AlertRule for RevenueShortfallRule {
    fn name(&self) -> &'static str {
        "revenue_shortfall"
    }

    fn evaluate(&self, result: &HealthScoreResult) -> Option<AlertCondition> {
        let achievement = result.key_metrics.revenue_achievement_rate? * 100.0;
        if achievement >= REVENUE_ACHIEVEMENT_THRESHOLD {
            return None;
        }

        let severity = if achievement < REVENUE_ACHIEVEMENT_SEVERE {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };

        Some(AlertCondition {
            alert_type: AlertType::RevenueShortfall,
            severity,
            message: format!("营收仅完成目标的 {achievement:.1}%"),
            metric: "revenue_achievement_rate".to_string(),
            value: achievement,
            threshold: REVENUE_ACHIEVEMENT_THRESHOLD,
        })
    }
}

pub struct LowHealthScoreRule;

impl AlertRule for LowHealthScoreRule {
    fn name(&self) -> &'static str {
        "low_health_score"
    }

    fn evaluate(&self, result: &HealthScoreResult) -> Option<AlertCondition> {
        if result.overall_score >= LOW_HEALTH_SCORE_THRESHOLD {
            return None;
        }

        Some(AlertCondition {
            alert_type: AlertType::LowHealthScore,
            severity: AlertSeverity::Critical,
            message: format!("健康度评分过低: {:.1}", result.overall_score),
            metric: "overall_score".to_string(),
            value: result.overall_score,
            threshold: LOW_HEALTH_SCORE_THRESHOLD,
        })
    }
}

pub struct LeadGenerationDropRule;

impl AlertRule for LeadGenerationDropRule {
    fn name(&self) -> &'static str {
        "lead_generation_drop"
    }

    fn evaluate(&self, result: &HealthScoreResult) -> Option<AlertCondition> {
        let growth = result.key_metrics.lead_growth_rate?;
        if growth >= LEAD_DROP_THRESHOLD {
            return None;
        }

        Some(AlertCondition {
            alert_type: AlertType::LeadGenerationDrop,
            severity: AlertSeverity::High,
            message: format!("新线索环比下降 {:.1}%", -growth),
            metric: "lead_growth_rate".to_string(),
            value: growth,
            threshold: LEAD_DROP_THRESHOLD,
        })
    }
}

pub struct StaleDataRule;

impl AlertRule for StaleDataRule {
    fn name(&self) -> &'static str {
        "stale_data"
    }

    fn evaluate(&self, result: &HealthScoreResult) -> Option<AlertCondition> {
        let age = result.key_metrics.data_age_hours;
        if age <= STALE_DATA_HOURS {
            return None;
        }

        Some(AlertCondition {
            alert_type: AlertType::StaleData,
            severity: AlertSeverity::Low,
            message: format!("指标数据已 {age:.0} 小时未更新"),
            metric: "data_age_hours".to_string(),
            value: age,
            threshold: STALE_DATA_HOURS,
        })
    }
}

pub struct ScoreDropRule;

impl AlertRule for ScoreDropRule {
    fn name(&self) -> &'static str {
        "score_drop"
    }

    fn evaluate(&self, result: &HealthScoreResult) -> Option<AlertCondition> {
        if result.score_change >= SCORE_DROP_THRESHOLD {
            return None;
        }

        Some(AlertCondition {
            alert_type: AlertType::ScoreDrop,
            severity: AlertSeverity::Medium,
            message: format!("健康度评分较上次下降 {:.1}%", -result.score_change),
            metric: "score_change".to_string(),
            value: result.score_change,
            threshold: SCORE_DROP_THRESHOLD,
        })
    }
}

/// 有序规则集合
pub struct AlertEvaluator {
    rules: Vec<Box<dyn AlertRule>>,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::default_rules()
    }
}

impl AlertEvaluator {
    /// 空规则集
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn default_rules() -> Self {
        Self::new()
            .with_rule(RevenueShortfallRule)
            .with_rule(LowHealthScoreRule)
            .with_rule(LeadGenerationDropRule)
            .with_rule(StaleDataRule)
            .with_rule(ScoreDropRule)
    }

    pub fn with_rule(mut self, rule: impl AlertRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn evaluate(&self, result: &HealthScoreResult, created_at: DateTime<Utc>) -> Vec<Alert> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(result))
            .map(|condition| Alert {
                target_id: result.location_id.clone(),
                alert_type: condition.alert_type,
                severity: condition.severity,
                message: condition.message,
                metric: condition.metric,
                value: condition.value,
                threshold: condition.threshold,
                created_at,
            })
            .collect()
    }
}

impl std::fmt::Debug for AlertEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEvaluator")
            .field("rules", &self.rule_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::healthy_metrics;
    use crate::HealthScorer;
    use pulse_core::config::ScoringConfig;

    fn healthy_result() -> HealthScoreResult {
        HealthScorer::new(ScoringConfig::default())
            .score(&healthy_metrics("loc-1"), None, Utc::now())
            .unwrap()
    }

    #[test]
    fn test_healthy_result_has_no_alerts() {
        let alerts = AlertEvaluator::default_rules().evaluate(&healthy_result(), Utc::now());
        assert!(alerts.is_empty(), "{alerts:?}");
    }

    #[test]
    fn test_revenue_shortfall_severity() {
        let mut result = healthy_result();

        result.key_metrics.revenue_achievement_rate = Some(0.7);
        let alerts = AlertEvaluator::default_rules().evaluate(&result, Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::RevenueShortfall);
        assert_eq!(alerts[0].severity, AlertSeverity::Medium);
        assert_eq!(alerts[0].threshold, 80.0);
        assert_eq!(alerts[0].target_id, "loc-1");

        result.key_metrics.revenue_achievement_rate = Some(0.5);
        let alerts = AlertEvaluator::default_rules().evaluate(&result, Utc::now());
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_missing_rates_do_not_alert() {
        let mut result = healthy_result();
        result.key_metrics.revenue_achievement_rate = None;
        result.key_metrics.lead_growth_rate = None;
        assert!(AlertEvaluator::default_rules()
            .evaluate(&result, Utc::now())
            .is_empty());
    }

    #[test]
    fn test_alerts_follow_rule_order() {
        let mut result = healthy_result();
        result.overall_score = 30.0;
        result.score_change = -25.0;
        result.key_metrics.revenue_achievement_rate = Some(0.4);
        result.key_metrics.lead_growth_rate = Some(-30.0);
        result.key_metrics.data_age_hours = 72.0;

        let types: Vec<AlertType> = AlertEvaluator::default_rules()
            .evaluate(&result, Utc::now())
            .into_iter()
            .map(|a| a.alert_type)
            .collect();

        assert_eq!(
            types,
            vec![
                AlertType::RevenueShortfall,
                AlertType::LowHealthScore,
                AlertType::LeadGenerationDrop,
                AlertType::StaleData,
                AlertType::ScoreDrop,
            ]
        );
    }

    #[test]
    fn test_boundaries_do_not_alert() {
        let mut result = healthy_result();
        result.overall_score = 40.0;
        result.score_change = -10.0;
        result.key_metrics.revenue_achievement_rate = Some(0.8);
        result.key_metrics.lead_growth_rate = Some(-15.0);
        result.key_metrics.data_age_hours = 48.0;
        assert!(AlertEvaluator::default_rules()
            .evaluate(&result, Utc::now())
            .is_empty());
    }

    struct AlwaysFires;

    impl AlertRule for AlwaysFires {
        fn name(&self) -> &'static str {
            "always"
        }

        fn evaluate(&self, _result: &HealthScoreResult) -> Option<AlertCondition> {
            Some(AlertCondition {
                alert_type: AlertType::StaleData,
                severity: AlertSeverity::Low,
                message: "test".to_string(),
                metric: "none".to_string(),
                value: 0.0,
                threshold: 0.0,
            })
        }
    }

    #[test]
    fn test_custom_rule_appended_last() {
        let evaluator = AlertEvaluator::default_rules().with_rule(AlwaysFires);
        assert_eq!(evaluator.rule_names().last(), Some(&"always"));
        assert_eq!(evaluator.evaluate(&healthy_result(), Utc::now()).len(), 1);
    }
}
