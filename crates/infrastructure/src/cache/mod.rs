//! 派生结果缓存
//!
//! 进程内键值缓存，每个条目带绝对过期时间，只按TTL淘汰，不设容量上限：
//! 条目数量与门店数乘以缓存产物种类成正比。

pub mod store;

pub use store::{CacheEntry, CacheStore};

use pulse_core::models::ForecastMetric;

/// 缓存键前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePrefix {
    Health,
    Trend,
    Forecast,
}

impl CachePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePrefix::Health => "health",
            CachePrefix::Trend => "trend",
            CachePrefix::Forecast => "forecast",
        }
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// 读取时发现过期和清扫时移除的条目总数
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}

/// Build cache key with prefix
pub fn build_cache_key(prefix: CachePrefix, id: &str) -> String {
    format!("{}:{}", prefix.as_str(), id)
}

/// Build cache key with multiple segments
pub fn build_cache_key_multi(prefix: CachePrefix, segments: &[&str]) -> String {
    format!("{}:{}", prefix.as_str(), segments.join(":"))
}

pub fn health_cache_key(location_id: &str) -> String {
    build_cache_key(CachePrefix::Health, location_id)
}

pub fn trend_cache_key(location_id: &str) -> String {
    build_cache_key(CachePrefix::Trend, location_id)
}

pub fn forecast_cache_key(location_id: &str, metric: ForecastMetric) -> String {
    build_cache_key_multi(CachePrefix::Forecast, &[location_id, metric.as_str()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        assert_eq!(health_cache_key("loc-1"), "health:loc-1");
        assert_eq!(trend_cache_key("loc-1"), "trend:loc-1");
        assert_eq!(
            forecast_cache_key("loc-1", ForecastMetric::Revenue),
            "forecast:loc-1:revenue"
        );
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
