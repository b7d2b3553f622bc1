//! 引擎配置
//!
//! 配置按 默认值 → TOML文件 → 环境变量 的顺序叠加，加载后统一校验。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use pulse_core::config::AppConfig;
//!
//! let config = AppConfig::load(Some("config/pulse.toml")).expect("加载配置失败");
//! println!("最大并发任务数: {}", config.engine.max_concurrent_tasks);
//! ```

pub mod models;

pub use models::*;
