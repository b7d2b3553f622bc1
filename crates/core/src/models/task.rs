use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{PulseError, PulseResult};

/// 处理任务
///
/// 一个延迟执行的工作单元：针对某个门店执行一种计算。
///
/// # 字段说明
///
/// - `id`: 入队时分配的唯一标识
/// - `kind`: 任务类型（健康度计算、趋势分析、预测更新、告警检查）
/// - `target_id`: 任务作用的门店ID
/// - `priority`: 调度优先级
/// - `payload`: 可选的任务输入数据
/// - `status`: 任务状态，只能沿 Pending → Running → Completed/Failed 前进
///
/// # 使用示例
///
/// ```rust
/// use pulse_core::models::{ProcessingTask, TaskKind, TaskPriority, TaskStatus};
/// use chrono::Utc;
///
/// let mut task = ProcessingTask::new(
///     TaskKind::HealthCalculation,
///     "loc-001",
///     TaskPriority::High,
///     Utc::now(),
/// );
/// assert_eq!(task.status, TaskStatus::Pending);
///
/// task.start(Utc::now()).unwrap();
/// task.complete(Utc::now()).unwrap();
/// assert!(task.is_finished());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingTask {
    pub id: Uuid,
    pub kind: TaskKind,
    pub target_id: String,
    pub priority: TaskPriority,
    pub payload: Option<serde_json::Value>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// 任务类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    HealthCalculation,
    TrendAnalysis,
    ForecastUpdate,
    AlertCheck,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::HealthCalculation => "health_calculation",
            TaskKind::TrendAnalysis => "trend_analysis",
            TaskKind::ForecastUpdate => "forecast_update",
            TaskKind::AlertCheck => "alert_check",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务优先级，`Critical > High > Medium > Low`
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务状态
///
/// ```text
/// Pending → Running → Completed
///                  ↘ Failed
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl ProcessingTask {
    /// 创建新任务，状态为 Pending
    pub fn new(
        kind: TaskKind,
        target_id: impl Into<String>,
        priority: TaskPriority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target_id: target_id.into(),
            priority,
            payload: None,
            status: TaskStatus::Pending,
            created_at,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn start(&mut self, at: DateTime<Utc>) -> PulseResult<()> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> PulseResult<()> {
        self.transition(TaskStatus::Completed)?;
        self.finished_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self, at: DateTime<Utc>, error: impl Into<String>) -> PulseResult<()> {
        self.transition(TaskStatus::Failed)?;
        self.finished_at = Some(at);
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// 去重键：同一门店同一类型的任务
    pub fn dedup_key(&self) -> (String, TaskKind) {
        (self.target_id.clone(), self.kind)
    }

    fn transition(&mut self, next: TaskStatus) -> PulseResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PulseError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
