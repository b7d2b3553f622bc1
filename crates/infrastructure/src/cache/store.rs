use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use pulse_core::{Clock, PulseResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::CacheStats;
use crate::observability::MetricsCollector;

/// 缓存条目
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: u64,
}

impl CacheEntry {
    /// `now` 达到过期时间即视为过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

/// TTL缓存
///
/// 所有修改都在同一把锁内完成，锁不会跨越 `.await`。
/// 过期条目在下次读取时惰性删除，并由周期清扫批量移除。
#[derive(Debug)]
pub struct CacheStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
}

impl CacheStore {
    pub fn new(clock: Arc<dyn Clock>, metrics: MetricsCollector) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 读取条目，命中时更新访问时间和访问次数
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let (value, expired_size) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match inner.entries.get_mut(key) {
                Some(entry) if !entry.is_expired(now) => {
                    entry.last_accessed_at = Some(now);
                    entry.access_count += 1;
                    inner.stats.hits += 1;
                    (Some(entry.value.clone()), None)
                }
                Some(_) => {
                    inner.entries.remove(key);
                    inner.stats.expirations += 1;
                    inner.stats.misses += 1;
                    (None, Some(inner.entries.len()))
                }
                None => {
                    inner.stats.misses += 1;
                    (None, None)
                }
            }
        };

        if value.is_some() {
            self.metrics.record_cache_hit();
        } else {
            self.metrics.record_cache_miss();
        }
        if let Some(size) = expired_size {
            debug!(cache.key = key, "缓存条目已过期");
            self.metrics.update_cache_size(size);
        }
        value
    }

    /// 读取并反序列化
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> PulseResult<Option<T>> {
        match self.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// 写入条目，覆盖同键的旧条目并重置访问统计
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut inner = self.lock();
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                expires_at,
                last_accessed_at: None,
                access_count: 0,
            },
        );
        inner.stats.sets += 1;
        let size = inner.entries.len();
        drop(inner);

        self.metrics.update_cache_size(size);
    }

    pub fn set_typed<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Duration,
    ) -> PulseResult<()> {
        self.set(key, serde_json::to_value(value)?, ttl);
        Ok(())
    }

    /// 查看条目元数据，不计入访问统计；已过期的条目返回 `None`
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
    }

    /// 删除条目，返回条目是否存在
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.stats.deletes += 1;
        }
        let size = inner.entries.len();
        drop(inner);

        self.metrics.update_cache_size(size);
        removed
    }

    /// 移除所有过期条目，返回移除数量
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - inner.entries.len();
        inner.stats.expirations += removed as u64;
        let size = inner.entries.len();
        drop(inner);

        self.metrics.update_cache_size(size);
        removed
    }

    /// 当前条目数，包含尚未清扫的过期条目
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use pulse_core::ManualClock;
    use serde_json::json;

    fn store() -> (CacheStore, ManualClock) {
        let clock = ManualClock::default();
        let store = CacheStore::new(Arc::new(clock.clone()), MetricsCollector::new());
        (store, clock)
    }

    #[test]
    fn test_get_after_set_updates_access_metadata() {
        let (store, _clock) = store();
        store.set("a", json!(1), Duration::from_millis(1000));

        assert_eq!(store.get("a"), Some(json!(1)));
        let entry = store.peek("a").unwrap();
        assert_eq!(entry.access_count, 1);
        assert!(entry.last_accessed_at.is_some());

        store.get("a");
        assert_eq!(store.peek("a").unwrap().access_count, 2);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let (store, clock) = store();
        store.set("a", json!(1), Duration::from_millis(1000));

        clock.advance(ChronoDuration::milliseconds(999));
        assert_eq!(store.get("a"), Some(json!(1)));

        clock.advance(ChronoDuration::milliseconds(1));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.len(), 0);

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_set_overwrites_and_resets_expiry() {
        let (store, clock) = store();
        store.set("a", json!("old"), Duration::from_secs(10));
        store.get("a");
        clock.advance(ChronoDuration::seconds(8));
        store.set("a", json!("new"), Duration::from_secs(10));
        clock.advance(ChronoDuration::seconds(8));

        let entry = store.peek("a").unwrap();
        assert_eq!(entry.value, json!("new"));
        assert_eq!(entry.access_count, 0);
        assert_eq!(store.get("a"), Some(json!("new")));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (store, clock) = store();
        store.set("short", json!(1), Duration::from_secs(1));
        store.set("long", json!(2), Duration::from_secs(100));
        assert_eq!(store.len(), 2);

        clock.advance(ChronoDuration::seconds(5));
        assert_eq!(store.len(), 2);
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.peek("long").is_some());
        assert_eq!(store.sweep_expired(), 0);
    }

    #[test]
    fn test_invalidate() {
        let (store, _clock) = store();
        store.set("a", json!(1), Duration::from_secs(1));
        assert!(store.invalidate("a"));
        assert!(!store.invalidate("a"));
        assert!(store.get("a").is_none());
        assert_eq!(store.stats().deletes, 1);
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Sample {
            score: f64,
        }

        let (store, _clock) = store();
        store
            .set_typed("s", &Sample { score: 72.5 }, Duration::from_secs(60))
            .unwrap();
        let loaded: Option<Sample> = store.get_typed("s").unwrap();
        assert_eq!(loaded, Some(Sample { score: 72.5 }));

        store.set("bad", json!("not a struct"), Duration::from_secs(60));
        assert!(store.get_typed::<Sample>("bad").is_err());
    }
}
