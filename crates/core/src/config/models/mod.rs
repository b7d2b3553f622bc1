pub mod app_config;
pub mod engine;
pub mod observability;
pub mod scoring;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use engine::{CacheConfig, EngineConfig};
pub use observability::ObservabilityConfig;
pub use scoring::{ForecastConfig, ScoringConfig, ScoringWeights, TrendConfig};
