use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HydraRouterConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 池子状态快照，命令行未指定时使用。
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "super::default_timezone_offset_hours")]
    pub timezone_offset_hours: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "super::default_max_hops")]
    pub max_hops: usize,
    /// 0 表示不设超时。
    #[serde(default = "super::default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,
    /// 0 表示资产对不变就一直复用池子状态。
    #[serde(default = "super::default_state_ttl_ms")]
    pub state_ttl_ms: u64,
    /// 任务图 worker 数；缺省读 `HYDRA_ROUTER_WORKERS`，再缺省按 CPU 核数。
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "super::default_slippage_bps")]
    pub slippage_bps: u32,
}

impl RouterConfig {
    pub fn quote_timeout(&self) -> Option<Duration> {
        (self.quote_timeout_ms > 0).then(|| Duration::from_millis(self.quote_timeout_ms))
    }

    pub fn state_ttl(&self) -> Option<Duration> {
        (self.state_ttl_ms > 0).then(|| Duration::from_millis(self.state_ttl_ms))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_router_section_keeps_defaults() {
        let yaml = r#"
router:
  max_hops: 2
  quote_timeout_ms: 0
"#;
        let config: HydraRouterConfig = serde_yaml::from_str(yaml).expect("parse yaml");
        assert_eq!(config.router.max_hops, 2);
        assert_eq!(config.router.quote_timeout(), None);
        assert_eq!(config.router.state_ttl(), Some(Duration::from_millis(6_000)));
        assert_eq!(config.router.slippage_bps, 50);
        assert_eq!(config.router.workers, None);
        assert_eq!(config.global.logging.level, "info");
        assert_eq!(config.global.logging.timezone_offset_hours, 0);
        assert!(!config.metrics.prometheus.enable);
        assert_eq!(config.metrics.prometheus.listen, "0.0.0.0:9898");
    }

    #[test]
    fn logging_and_metrics_sections_parse() {
        let yaml = r#"
global:
  logging:
    level: "debug,hydra::routes=trace"
    json: true
  snapshot_path: snapshots/hydradx.yaml
metrics:
  prometheus:
    enable: true
    listen: "127.0.0.1:9000"
"#;
        let config: HydraRouterConfig = serde_yaml::from_str(yaml).expect("parse yaml");
        assert!(config.global.logging.json);
        assert_eq!(config.global.logging.level, "debug,hydra::routes=trace");
        assert_eq!(
            config.global.snapshot_path,
            Some(PathBuf::from("snapshots/hydradx.yaml"))
        );
        assert!(config.metrics.prometheus.enable);
        assert_eq!(config.metrics.prometheus.listen, "127.0.0.1:9000");
    }
}
