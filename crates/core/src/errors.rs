use thiserror::Error;

use crate::models::TaskStatus;

/// 引擎错误类型定义
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("门店数据不可用: {location_id}")]
    DataUnavailable { location_id: String },

    #[error("评分计算错误: {0}")]
    Computation(String),

    #[error("持久化错误: {0}")]
    Persistence(String),

    #[error("指标网关错误: {0}")]
    MetricsGateway(String),

    #[error("操作 '{operation}' 执行超时 ({timeout_ms}ms)")]
    ExecutionTimeout { operation: String, timeout_ms: u64 },

    #[error("任务执行异常终止: {0}")]
    TaskPanicked(String),

    #[error("无效的任务状态转换: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PulseError {
    pub fn timeout_error(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ExecutionTimeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ExecutionTimeout { .. })
    }

    /// 错误分类标签，用于日志和指标维度
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::Computation(_) => "computation",
            Self::Persistence(_) => "persistence",
            Self::MetricsGateway(_) => "metrics_gateway",
            Self::ExecutionTimeout { .. } => "timeout",
            Self::TaskPanicked(_) => "panicked",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Configuration(_) => "configuration",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// 统一的Result类型
pub type PulseResult<T> = std::result::Result<T, PulseError>;
