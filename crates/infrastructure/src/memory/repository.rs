use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::models::{Alert, HealthScoreResult, HealthSnapshot};
use pulse_core::traits::HealthRepository;
use pulse_core::{PulseError, PulseResult};

#[derive(Debug, Default)]
struct LocationRecord {
    /// 按计算时间正序
    history: Vec<HealthSnapshot>,
    latest: Option<HealthScoreResult>,
}

impl LocationRecord {
    fn insert_snapshot(&mut self, snapshot: HealthSnapshot) {
        let position = self
            .history
            .partition_point(|existing| existing.computed_at <= snapshot.computed_at);
        self.history.insert(position, snapshot);
    }
}

#[derive(Debug, Default)]
struct State {
    locations: BTreeSet<String>,
    records: HashMap<String, LocationRecord>,
    alerts: Vec<Alert>,
}

/// 内存健康度仓储
///
/// 写入失败可通过 [`set_fail_writes`](Self::set_fail_writes) 注入，读取始终成功。
#[derive(Debug, Clone, Default)]
pub struct InMemoryHealthRepository {
    state: Arc<Mutex<State>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryHealthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 注册一个门店，不写入任何结果
    pub fn add_location(&self, location_id: impl Into<String>) {
        self.state().locations.insert(location_id.into());
    }

    /// 直接写入历史评分，跳过完整结果
    pub fn seed_history(&self, location_id: &str, snapshots: impl IntoIterator<Item = HealthSnapshot>) {
        let mut state = self.state();
        state.locations.insert(location_id.to_string());
        let record = state.records.entry(location_id.to_string()).or_default();
        for snapshot in snapshots {
            record.insert_snapshot(snapshot);
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn latest_result(&self, location_id: &str) -> Option<HealthScoreResult> {
        self.state()
            .records
            .get(location_id)
            .and_then(|record| record.latest.clone())
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state().alerts.clone()
    }

    pub fn alerts_for(&self, location_id: &str) -> Vec<Alert> {
        self.state()
            .alerts
            .iter()
            .filter(|alert| alert.target_id == location_id)
            .cloned()
            .collect()
    }

    fn check_writable(&self) -> PulseResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PulseError::Persistence("存储不可写".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HealthRepository for InMemoryHealthRepository {
    async fn get_last_computed_at(&self, location_id: &str) -> PulseResult<Option<DateTime<Utc>>> {
        Ok(self
            .state()
            .records
            .get(location_id)
            .and_then(|record| record.history.last())
            .map(|snapshot| snapshot.computed_at))
    }

    async fn upsert_health_result(
        &self,
        location_id: &str,
        result: &HealthScoreResult,
        computed_at: DateTime<Utc>,
    ) -> PulseResult<()> {
        self.check_writable()?;

        let mut state = self.state();
        state.locations.insert(location_id.to_string());
        let record = state.records.entry(location_id.to_string()).or_default();
        record.insert_snapshot(HealthSnapshot {
            score: result.overall_score,
            computed_at,
        });
        record.latest = Some(result.clone());
        Ok(())
    }

    async fn get_history(&self, location_id: &str, limit: usize) -> PulseResult<Vec<HealthSnapshot>> {
        Ok(self
            .state()
            .records
            .get(location_id)
            .map(|record| {
                let start = record.history.len().saturating_sub(limit);
                record.history[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn insert_alert(&self, alert: &Alert) -> PulseResult<()> {
        self.check_writable()?;
        self.state().alerts.push(alert.clone());
        Ok(())
    }

    async fn list_known_location_ids(&self) -> PulseResult<BTreeSet<String>> {
        Ok(self.state().locations.clone())
    }
}
