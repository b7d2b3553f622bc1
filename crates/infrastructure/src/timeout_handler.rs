//! Timeout handling utilities for async operations
//!
//! Collaborator calls (metrics gateway, persistence layer) are network-bound;
//! every call goes through [`TimeoutHandler`] so a stuck collaborator fails the
//! task instead of holding a dispatcher slot forever.

use std::future::Future;
use std::time::Duration;

use pulse_core::config::EngineConfig;
use pulse_core::{PulseError, PulseResult};
use tokio::time::timeout;
use tracing::error;

/// Timeout values for the collaborator call types
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Metrics gateway calls timeout
    pub gateway_timeout: Duration,
    /// Persistence layer calls timeout
    pub persistence_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(15),
            persistence_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&EngineConfig> for TimeoutConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            gateway_timeout: Duration::from_secs(config.gateway_timeout_seconds),
            persistence_timeout: Duration::from_secs(config.persistence_timeout_seconds),
        }
    }
}

/// Timeout handler utility for async operations
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutHandler {
    config: TimeoutConfig,
}

impl TimeoutHandler {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// Execute metrics gateway call with timeout
    pub async fn gateway_operation<F, T>(&self, operation: F, operation_name: &str) -> PulseResult<T>
    where
        F: Future<Output = PulseResult<T>>,
    {
        execute_with_timeout(operation, self.config.gateway_timeout, "指标网关", operation_name)
            .await
    }

    /// Execute persistence call with timeout
    pub async fn persistence_operation<F, T>(
        &self,
        operation: F,
        operation_name: &str,
    ) -> PulseResult<T>
    where
        F: Future<Output = PulseResult<T>>,
    {
        execute_with_timeout(
            operation,
            self.config.persistence_timeout,
            "持久化",
            operation_name,
        )
        .await
    }
}

/// Execute operation with a custom timeout
pub async fn execute_with_timeout<F, T>(
    operation: F,
    timeout_duration: Duration,
    operation_type: &str,
    operation_name: &str,
) -> PulseResult<T>
where
    F: Future<Output = PulseResult<T>>,
{
    match timeout(timeout_duration, operation).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                operation.kind = operation_type,
                operation.name = operation_name,
                timeout_ms = timeout_duration.as_millis() as u64,
                "{operation_type}操作超时"
            );
            Err(PulseError::timeout_error(
                format!("{operation_type}:{operation_name}"),
                timeout_duration.as_millis() as u64,
            ))
        }
    }
}
