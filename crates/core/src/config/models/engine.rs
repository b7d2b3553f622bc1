use serde::{Deserialize, Serialize};

/// 调度与分发配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// 同时运行的最大任务数
    pub max_concurrent_tasks: usize,
    /// 单个任务执行超时（秒）
    pub task_timeout_seconds: u64,
    /// 陈旧度扫描间隔（秒）
    pub scan_interval_seconds: u64,
    /// 结果超过该时长视为陈旧（秒）
    pub staleness_window_seconds: i64,
    /// 缓存过期清理间隔（秒）
    pub cache_cleanup_interval_seconds: u64,
    /// 读取历史评分的条数
    pub history_limit: usize,
    /// 预测的未来周期数
    pub forecast_period: usize,
    /// 保留已结束任务的条数，供状态查询
    pub finished_task_retention: usize,
    /// 指标网关调用超时（秒）
    pub gateway_timeout_seconds: u64,
    /// 持久化调用超时（秒）
    pub persistence_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            task_timeout_seconds: 60,
            scan_interval_seconds: 30,
            staleness_window_seconds: 2 * 60 * 60,
            cache_cleanup_interval_seconds: 60 * 60,
            history_limit: 30,
            forecast_period: 30,
            finished_task_retention: 1000,
            gateway_timeout_seconds: 15,
            persistence_timeout_seconds: 10,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(anyhow::anyhow!("最大并发任务数必须大于0"));
        }

        if self.task_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("任务超时时间必须大于0"));
        }

        if self.scan_interval_seconds == 0 {
            return Err(anyhow::anyhow!("扫描间隔必须大于0"));
        }

        if self.staleness_window_seconds <= 0 {
            return Err(anyhow::anyhow!("陈旧窗口必须大于0"));
        }

        if chrono::TimeDelta::try_seconds(self.staleness_window_seconds).is_none() {
            return Err(anyhow::anyhow!(
                "陈旧窗口超出范围: {}秒",
                self.staleness_window_seconds
            ));
        }

        if self.cache_cleanup_interval_seconds == 0 {
            return Err(anyhow::anyhow!("缓存清理间隔必须大于0"));
        }

        if self.forecast_period == 0 {
            return Err(anyhow::anyhow!("预测周期数必须大于0"));
        }

        if self.gateway_timeout_seconds == 0 || self.persistence_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("协作方调用超时时间必须大于0"));
        }

        Ok(())
    }
}

/// 各类缓存产物的TTL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub health_ttl_seconds: u64,
    pub trend_ttl_seconds: u64,
    pub forecast_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            health_ttl_seconds: 2 * 60 * 60,
            trend_ttl_seconds: 60 * 60,
            forecast_ttl_seconds: 6 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.health_ttl_seconds == 0
            || self.trend_ttl_seconds == 0
            || self.forecast_ttl_seconds == 0
        {
            return Err(anyhow::anyhow!("缓存TTL必须大于0"));
        }
        Ok(())
    }
}
