//! # 数据模型
//!
//! 定义健康度计算引擎的核心数据结构：处理任务、原始指标、评分结果、
//! 趋势与预测结果以及告警。
//!
//! ## 核心模型
//!
//! ### ProcessingTask - 处理任务
//! 入队的工作单元，带有任务类型、目标门店和优先级。
//!
//! ### RawMetrics - 原始指标
//! 指标网关返回的门店扁平数值记录。
//!
//! ### HealthScoreResult - 健康度评分
//! 评分管道输出，由持久化层保存，同时写入缓存。
//!
//! ### TrendResult / ForecastResult - 趋势与预测
//! 基于历史序列的派生结果，只写入缓存。
//!
//! ### Alert - 告警
//! 告警规则命中后生成，由告警发射器写入持久化层。
//!
//! ## 状态管理
//!
//! ### 任务状态流转
//! ```text
//! Pending → Running → Completed
//!                  ↘ Failed
//! ```
//! 终态不可变更，失败任务不会自动重新入队。
//!
//! ## 设计原则
//!
//! - 所有时间字段使用 `DateTime<Utc>`
//! - 状态与类型字段使用枚举，序列化为 snake_case 字符串
//! - 所有模型实现 `serde::Serialize` / `serde::Deserialize`，便于写入缓存

pub mod alert;
pub mod analysis;
pub mod health;
pub mod metrics;
pub mod task;

pub use alert::*;
pub use analysis::*;
pub use health::*;
pub use metrics::*;
pub use task::*;
