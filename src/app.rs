use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use pulse_core::AppConfig;
use pulse_dispatcher::HealthEngine;
use pulse_infrastructure::memory::fixtures::seed_demo_locations;
use pulse_infrastructure::{InMemoryHealthRepository, InMemoryMetricsGateway};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 主应用程序
///
/// 引擎接入进程内的指标网关和存储，启动时写入演示门店。
pub struct Application {
    config: AppConfig,
    engine: Arc<HealthEngine>,
    gateway: InMemoryMetricsGateway,
    repository: InMemoryHealthRepository,
    location_ids: Vec<String>,
}

impl Application {
    pub fn new(config: AppConfig, demo_locations: usize) -> Result<Self> {
        Self::build(config, demo_locations, StdRng::from_os_rng(), None)
    }

    /// 固定随机种子，演示数据和基线估计都可复现
    pub fn with_seed(config: AppConfig, demo_locations: usize, seed: u64) -> Result<Self> {
        Self::build(
            config,
            demo_locations,
            StdRng::seed_from_u64(seed),
            Some(seed),
        )
    }

    fn build(
        config: AppConfig,
        demo_locations: usize,
        mut rng: StdRng,
        engine_seed: Option<u64>,
    ) -> Result<Self> {
        info!("初始化应用程序，演示门店数: {}", demo_locations);

        let gateway = InMemoryMetricsGateway::new();
        let repository = InMemoryHealthRepository::new();
        let location_ids =
            seed_demo_locations(&gateway, &repository, demo_locations, Utc::now(), &mut rng);

        let mut builder =
            HealthEngine::builder(Arc::new(gateway.clone()), Arc::new(repository.clone()))
                .config(config.clone());
        if let Some(seed) = engine_seed {
            builder = builder.rng_seed(seed);
        }

        let engine = builder.build().context("构建健康度引擎失败")?;

        Ok(Self {
            config,
            engine: Arc::new(engine),
            gateway,
            repository,
            location_ids,
        })
    }

    pub fn engine(&self) -> &Arc<HealthEngine> {
        &self.engine
    }

    pub fn gateway(&self) -> &InMemoryMetricsGateway {
        &self.gateway
    }

    pub fn repository(&self) -> &InMemoryHealthRepository {
        &self.repository
    }

    pub fn location_ids(&self) -> &[String] {
        &self.location_ids
    }

    /// 启动定时器并运行到收到关闭信号
    ///
    /// 关闭时先停止定时器，再在任务超时时长内等待在途任务结束。
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut timers = self.engine.start();
        info!("应用已启动，等待关闭信号");

        let _ = shutdown_rx.recv().await;
        info!("开始关闭应用");

        timers.stop().await;

        let drain_timeout = Duration::from_secs(self.config.engine.task_timeout_seconds);
        if self.engine.drain(drain_timeout).await {
            info!("在途任务已全部结束");
        } else {
            let status = self.engine.status();
            warn!(
                queue_length = status.queue_length,
                active_count = status.active_count,
                "等待在途任务超时，放弃剩余任务"
            );
        }

        let stats = self.engine.stats();
        info!(
            enqueued = stats.enqueued,
            completed = stats.completed,
            failed = stats.failed,
            timed_out = stats.timed_out,
            peak_active = stats.peak_active,
            "应用已关闭"
        );
        Ok(())
    }
}
