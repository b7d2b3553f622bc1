use serde::{Deserialize, Serialize};

/// 门店原始指标
///
/// 由指标网关从持久化/CRM采集层读取的扁平数值记录。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    pub location_id: String,

    // 线索
    pub total_contacts: u64,
    pub new_contacts: u64,
    pub new_contacts_previous: u64,

    // 商机
    pub total_opportunities: u64,
    pub won_opportunities: u64,
    pub lost_opportunities: u64,
    pub open_opportunities: u64,

    // 营收
    pub revenue: f64,
    pub revenue_target: f64,
    pub pipeline_value: f64,

    // 团队
    pub total_agents: u32,
    pub active_agents: u32,
    pub appointments_booked: u64,
    pub appointments_completed: u64,
    pub avg_response_time_minutes: f64,

    // 客户
    /// 0-5 分
    pub customer_satisfaction: f64,
    pub total_customers: u64,
    pub churned_customers: u64,

    // 技术
    pub integrations_active: u32,
    pub integrations_total: u32,
    /// 0-1
    pub automation_rate: f64,

    /// 数据距今小时数
    pub data_age_hours: f64,
}

/// 可预测的指标类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMetric {
    Revenue,
    Leads,
    HealthScore,
}

impl ForecastMetric {
    pub const ALL: [ForecastMetric; 3] = [
        ForecastMetric::Revenue,
        ForecastMetric::Leads,
        ForecastMetric::HealthScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMetric::Revenue => "revenue",
            ForecastMetric::Leads => "leads",
            ForecastMetric::HealthScore => "health_score",
        }
    }

    /// 无历史数据时使用的基线值
    pub fn baseline_value(&self) -> f64 {
        match self {
            ForecastMetric::Revenue => 10_000.0,
            ForecastMetric::Leads => 50.0,
            ForecastMetric::HealthScore => 65.0,
        }
    }
}
