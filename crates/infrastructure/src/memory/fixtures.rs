//! 演示数据
//!
//! 为内存网关和仓储生成看起来合理的门店指标和历史序列。

use chrono::{DateTime, Duration, Utc};
use pulse_core::models::{ForecastMetric, HealthSnapshot, RawMetrics};
use rand::Rng;

use super::{InMemoryHealthRepository, InMemoryMetricsGateway};

/// 历史序列天数
const DEMO_HISTORY_DAYS: usize = 30;

pub fn demo_location_id(index: usize) -> String {
    format!("loc-{:03}", index + 1)
}

/// 随机生成一家门店的当前指标
pub fn demo_metrics<R: Rng + ?Sized>(location_id: &str, rng: &mut R) -> RawMetrics {
    let total_contacts = rng.random_range(200..2000);
    let total_opportunities = rng.random_range(20..=total_contacts / 4);
    let won = rng.random_range(0..=total_opportunities / 2);
    let lost = rng.random_range(0..=(total_opportunities - won) / 2);
    let total_agents = rng.random_range(3..20);
    let booked = rng.random_range(30..400);
    let total_customers = rng.random_range(100..1500);
    let integrations_total = rng.random_range(1..8);
    let revenue_target = f64::from(rng.random_range(50..200u32)) * 1000.0;

    RawMetrics {
        location_id: location_id.to_string(),
        total_contacts,
        new_contacts: rng.random_range(20..300),
        new_contacts_previous: rng.random_range(20..300),
        total_opportunities,
        won_opportunities: won,
        lost_opportunities: lost,
        open_opportunities: total_opportunities - won - lost,
        revenue: revenue_target * rng.random_range(0.4..1.3),
        revenue_target,
        pipeline_value: revenue_target * rng.random_range(1.0..3.0),
        total_agents,
        active_agents: rng.random_range(1..=total_agents),
        appointments_booked: booked,
        appointments_completed: rng.random_range(0..=booked),
        avg_response_time_minutes: rng.random_range(2.0..40.0),
        customer_satisfaction: rng.random_range(2.5..5.0),
        total_customers,
        churned_customers: rng.random_range(0..total_customers / 5),
        integrations_active: rng.random_range(0..=integrations_total),
        integrations_total,
        automation_rate: rng.random_range(0.0..1.0),
        data_age_hours: rng.random_range(0.0..72.0),
    }
}

/// 围绕 `start` 随机游走并带线性漂移的日序列
pub fn demo_series<R: Rng + ?Sized>(start: f64, drift: f64, days: usize, rng: &mut R) -> Vec<f64> {
    let mut value = start;
    (0..days)
        .map(|_| {
            value = (value + drift + rng.random_range(-0.05..0.05) * start).max(0.0);
            value.round()
        })
        .collect()
}

/// 生成 `count` 家门店：当前指标、营收/线索序列，以及部分门店的历史评分
pub fn seed_demo_locations<R: Rng + ?Sized>(
    gateway: &InMemoryMetricsGateway,
    repository: &InMemoryHealthRepository,
    count: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<String> {
    let mut location_ids = Vec::with_capacity(count);

    for index in 0..count {
        let location_id = demo_location_id(index);
        let metrics = demo_metrics(&location_id, rng);

        let daily_revenue = metrics.revenue / 30.0;
        gateway.set_history(
            &location_id,
            ForecastMetric::Revenue,
            demo_series(daily_revenue, daily_revenue * 0.01, DEMO_HISTORY_DAYS, rng),
        );
        gateway.set_history(
            &location_id,
            ForecastMetric::Leads,
            demo_series(metrics.new_contacts as f64 / 30.0 + 5.0, 0.1, DEMO_HISTORY_DAYS, rng),
        );
        gateway.insert_metrics(metrics);

        // 每三家有一家从未计算过
        if index % 3 == 0 {
            repository.add_location(location_id.clone());
        } else {
            let start = f64::from(rng.random_range(40..80u32));
            let scores = demo_series(start, 0.2, DEMO_HISTORY_DAYS, rng);
            repository.seed_history(
                &location_id,
                scores.into_iter().enumerate().map(|(day, score)| HealthSnapshot {
                    score: score.min(100.0),
                    computed_at: now - Duration::days((DEMO_HISTORY_DAYS - day) as i64),
                }),
            );
        }

        location_ids.push(location_id);
    }

    location_ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::traits::HealthRepository;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_demo_metrics_are_consistent() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let m = demo_metrics("loc", &mut rng);
            assert!(m.won_opportunities + m.lost_opportunities <= m.total_opportunities);
            assert!(m.active_agents <= m.total_agents);
            assert!(m.appointments_completed <= m.appointments_booked);
            assert!(m.integrations_active <= m.integrations_total);
            assert!(m.churned_customers < m.total_customers);
        }
    }

    #[tokio::test]
    async fn test_seed_demo_locations() {
        let gateway = InMemoryMetricsGateway::new();
        let repository = InMemoryHealthRepository::new();
        let mut rng = StdRng::seed_from_u64(1);

        let ids = seed_demo_locations(&gateway, &repository, 6, Utc::now(), &mut rng);
        assert_eq!(ids.len(), 6);
        assert_eq!(repository.list_known_location_ids().await.unwrap().len(), 6);
        assert!(repository.get_last_computed_at(&ids[0]).await.unwrap().is_none());
        assert_eq!(repository.get_history(&ids[1], 100).await.unwrap().len(), 30);
    }
}
