//! 持久化层接口定义
//!
//! 引擎把关系型存储当作黑盒协作方，只通过 [`HealthRepository`] 访问：
//! - 读取门店最近一次计算时间，用于陈旧度扫描
//! - 写入健康度结果
//! - 读取历史评分，用于评分变化、趋势和预测
//! - 写入告警
//! - 列出所有已知门店
//!
//! ## 设计原则
//!
//! ### 异步设计
//! 所有操作都是异步的，实现必须是 `Send + Sync`，调用方不会在持有锁时等待。
//!
//! ### 抽象解耦
//! 表结构和迁移不属于引擎职责。内存实现见
//! `pulse_infrastructure::memory::InMemoryHealthRepository`。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use pulse_core::traits::HealthRepository;
//!
//! async fn print_history(repo: &dyn HealthRepository) -> PulseResult<()> {
//!     for location_id in repo.list_known_location_ids().await? {
//!         let history = repo.get_history(&location_id, 7).await?;
//!         println!("{location_id}: {} 条历史评分", history.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Alert, HealthScoreResult, HealthSnapshot};
use crate::PulseResult;

/// 健康度结果仓储接口
#[async_trait]
pub trait HealthRepository: Send + Sync {
    /// 获取门店最近一次成功计算的时间，从未计算过返回 `None`
    async fn get_last_computed_at(&self, location_id: &str) -> PulseResult<Option<DateTime<Utc>>>;

    /// 写入（或覆盖）门店的健康度结果
    async fn upsert_health_result(
        &self,
        location_id: &str,
        result: &HealthScoreResult,
        computed_at: DateTime<Utc>,
    ) -> PulseResult<()>;

    /// 获取最近 `limit` 条历史评分，按时间正序（最新的在最后）
    async fn get_history(&self, location_id: &str, limit: usize) -> PulseResult<Vec<HealthSnapshot>>;

    /// 写入一条告警
    async fn insert_alert(&self, alert: &Alert) -> PulseResult<()>;

    /// 列出所有已知门店ID
    async fn list_known_location_ids(&self) -> PulseResult<BTreeSet<String>>;
}
