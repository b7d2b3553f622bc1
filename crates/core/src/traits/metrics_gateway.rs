use async_trait::async_trait;

use crate::models::{ForecastMetric, RawMetrics};
use crate::PulseResult;

/// 指标网关
///
/// 从采集层读取门店原始指标。网关调用受外部网络约束，调用方负责加超时。
#[async_trait]
pub trait MetricsGateway: Send + Sync {
    /// 获取门店当前指标，没有数据时返回 `None`
    async fn fetch_metrics(&self, location_id: &str) -> PulseResult<Option<RawMetrics>>;

    /// 获取某个指标最近 `days` 天的日序列，按时间正序
    async fn fetch_metric_history(
        &self,
        location_id: &str,
        metric: ForecastMetric,
        days: usize,
    ) -> PulseResult<Vec<f64>>;
}
