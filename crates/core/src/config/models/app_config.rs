use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    engine::{CacheConfig, EngineConfig},
    observability::ObservabilityConfig,
    scoring::ScoringConfig,
};

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration (every section is `#[serde(default)]`)
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: PULSE_, nested with `__`,
    ///    e.g. `PULSE_ENGINE__MAX_CONCURRENT_TASKS=8`)
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    ///
    /// # Returns
    ///
    /// Returns loaded and validated configuration
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/pulse.toml", "pulse.toml", "/etc/pulse/config.toml"];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        // 2. Environment variable overrides - highest priority
        builder = builder.add_source(
            Environment::with_prefix("PULSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("引擎配置验证失败")?;

        self.cache.validate().context("缓存配置验证失败")?;

        self.scoring.validate().context("评分配置验证失败")?;

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.max_concurrent_tasks, 5);
        assert_eq!(config.engine.scan_interval_seconds, 30);
        assert_eq!(config.engine.staleness_window_seconds, 7200);
        assert_eq!(config.engine.cache_cleanup_interval_seconds, 3600);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [engine]
            max_concurrent_tasks = 2

            [scoring.weights]
            financial = 0.30
            operational = 0.15
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.max_concurrent_tasks, 2);
        assert_eq!(config.engine.task_timeout_seconds, 60);
        assert_eq!(config.scoring.weights.financial, 0.30);
        assert_eq!(config.scoring.weights.team, 0.15);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [engine]
            max_concurrent_tasks = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_staleness_window_rejected() {
        let mut config = AppConfig::default();
        config.engine.staleness_window_seconds = i64::MAX;
        assert!(config.validate().is_err());

        config.engine.staleness_window_seconds = 30 * 24 * 60 * 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [engine]
            scan_interval_seconds = 45

            [observability]
            log_format = "json"
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.engine.scan_interval_seconds, 45);
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.cache.forecast_ttl_seconds, 21600);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = AppConfig::load(Some("/definitely/not/here/pulse.toml"));
        assert!(result.is_err());
    }
}
