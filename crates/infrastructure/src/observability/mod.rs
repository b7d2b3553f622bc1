//! Observability module
//!
//! - Metrics collection through the `metrics` facade
//! - Structured logging of engine events

pub mod metrics_collector;
pub mod structured_logger;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
