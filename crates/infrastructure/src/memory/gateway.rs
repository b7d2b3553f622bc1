use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::models::{ForecastMetric, RawMetrics};
use pulse_core::traits::MetricsGateway;
use pulse_core::{PulseError, PulseResult};

/// 内存指标网关
///
/// 嵌入式运行和测试共用。克隆实例共享同一份数据，
/// 测试可以通过 [`set_failing`](Self::set_failing) 和 [`set_delay`](Self::set_delay) 注入故障。
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsGateway {
    metrics: Arc<Mutex<HashMap<String, RawMetrics>>>,
    histories: Arc<Mutex<HashMap<(String, ForecastMetric), Vec<f64>>>>,
    failing: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
    fetch_count: Arc<AtomicUsize>,
}

impl InMemoryMetricsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_metrics(&self, metrics: RawMetrics) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metrics.location_id.clone(), metrics);
    }

    pub fn remove_metrics(&self, location_id: &str) -> Option<RawMetrics> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(location_id)
    }

    /// 设置某个指标的日序列，按时间正序
    pub fn set_history(&self, location_id: &str, metric: ForecastMetric, values: Vec<f64>) {
        self.histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((location_id.to_string(), metric), values);
    }

    /// 开启后所有调用返回 `MetricsGateway` 错误
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 每次调用前等待的时长，用于模拟慢速网络
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// `fetch_metrics` 被调用的次数
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    async fn simulate_network(&self) -> PulseResult<()> {
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PulseError::MetricsGateway("指标网关不可用".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsGateway for InMemoryMetricsGateway {
    async fn fetch_metrics(&self, location_id: &str) -> PulseResult<Option<RawMetrics>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;

        Ok(self
            .metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location_id)
            .cloned())
    }

    async fn fetch_metric_history(
        &self,
        location_id: &str,
        metric: ForecastMetric,
        days: usize,
    ) -> PulseResult<Vec<f64>> {
        self.simulate_network().await?;

        let histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
        let values = histories
            .get(&(location_id.to_string(), metric))
            .map(|values| values[values.len().saturating_sub(days)..].to_vec())
            .unwrap_or_default();
        Ok(values)
    }
}
