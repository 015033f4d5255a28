use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::config::PrometheusConfig;

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 按配置安装 Prometheus exporter；未启用时返回 `None`，重复调用只安装一次。
pub fn try_init_prometheus(config: &PrometheusConfig) -> Result<Option<SocketAddr>> {
    if !config.enable {
        return Ok(None);
    }
    let addr = EXPORTER.get_or_try_init(|| {
        let addr = parse_listen(&config.listen)?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("安装 Prometheus exporter 失败")?;
        PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
        info!(target: "monitoring", listen = %addr, "Prometheus 指标已启用");
        Ok::<_, anyhow::Error>(addr)
    })?;
    Ok(Some(*addr))
}

fn parse_listen(listen: &str) -> Result<SocketAddr> {
    listen
        .trim()
        .parse()
        .with_context(|| format!("无效的 Prometheus 监听地址: {listen}"))
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}
