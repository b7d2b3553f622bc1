//! # 任务分发与调度
//!
//! - [`dispatcher`] - 有界并发分发器，负责状态流转、超时、panic隔离和去重
//! - [`processor`] - 按任务类型执行计算、持久化和缓存
//! - [`scheduler`] - 陈旧度扫描
//! - [`alert_emitter`] - 告警写入
//! - [`timer`] - 可取消的周期定时器
//! - [`engine`] - 对外的 [`HealthEngine`] 门面

pub mod alert_emitter;
pub mod dispatcher;
pub mod engine;
pub mod processor;
pub mod scheduler;
pub mod timer;

pub use alert_emitter::{AlertEmitter, EmitSummary};
pub use dispatcher::{DispatcherConfig, DispatcherLoad, DispatcherStats, TaskDispatcher};
pub use engine::{EngineStatus, EngineTimers, HealthEngine, HealthEngineBuilder};
pub use processor::{HealthTaskProcessor, ProcessorSettings};
pub use scheduler::{ScanReport, StalenessScanner};
pub use timer::PeriodicTimer;
