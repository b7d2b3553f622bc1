//! # 引擎基础设施
//!
//! - [`task_queue`] - 优先级任务队列
//! - [`cache`] - 带TTL的派生结果缓存
//! - [`timeout_handler`] - 协作方调用超时
//! - [`observability`] - 指标和结构化日志
//! - [`memory`] - 内存版指标网关和健康度仓储

pub mod cache;
pub mod memory;
pub mod observability;
pub mod task_queue;
pub mod timeout_handler;

pub use cache::{CacheEntry, CachePrefix, CacheStats, CacheStore};
pub use memory::{InMemoryHealthRepository, InMemoryMetricsGateway};
pub use observability::{MetricsCollector, StructuredLogger};
pub use task_queue::PriorityTaskQueue;
pub use timeout_handler::{TimeoutConfig, TimeoutHandler};
