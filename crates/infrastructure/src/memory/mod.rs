//! 内存协作方实现
//!
//! 单进程嵌入式运行时充当指标网关和持久化层，测试中充当可注入故障的替身。

pub mod fixtures;
pub mod gateway;
pub mod repository;

pub use gateway::InMemoryMetricsGateway;
pub use repository::InMemoryHealthRepository;
