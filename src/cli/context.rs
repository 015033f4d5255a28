use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use rust_decimal::Decimal;
use time::{UtcOffset, macros::format_description};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};

use crate::concurrency::resolve_worker_count;
use crate::config::{ConfigError, HydraRouterConfig, LoggingConfig, RouterConfig, load_config};
use crate::graph::GraphExecutor;
use crate::hydra::{Balance, ChainSnapshot, HydraQuoteFactory, QuoteFactorySettings, SnapshotReader};

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 加载主配置；用于 `hydra-router --config` 的入口。
pub fn load_configuration(path: Option<PathBuf>) -> Result<HydraRouterConfig, ConfigError> {
    load_config(path)
}

/// 命令行参数优先，其次 `global.snapshot_path`。
pub fn resolve_snapshot_path(
    explicit: Option<PathBuf>,
    config: &HydraRouterConfig,
) -> Result<PathBuf> {
    explicit
        .or_else(|| config.global.snapshot_path.clone())
        .ok_or_else(|| anyhow!("未指定池子快照：请传入 --snapshot 或配置 global.snapshot_path"))
}

pub fn build_executor(router: &RouterConfig) -> GraphExecutor {
    GraphExecutor::new(resolve_worker_count(router.workers))
}

pub fn factory_settings(router: &RouterConfig) -> QuoteFactorySettings {
    QuoteFactorySettings {
        max_hops: router.max_hops,
        state_ttl: router.state_ttl(),
    }
}

/// 以快照文件代替链连接，构建报价工厂。
pub fn build_factory(
    snapshot: PathBuf,
    config: &HydraRouterConfig,
    settings: QuoteFactorySettings,
) -> Result<Arc<HydraQuoteFactory>> {
    let snapshot = ChainSnapshot::load(&snapshot)?;
    let reader = Arc::new(SnapshotReader::from_snapshot(snapshot));
    Ok(Arc::new(HydraQuoteFactory::new(
        reader,
        build_executor(&config.router),
        settings,
    )))
}

pub fn init_configs(args: crate::cli::args::InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let templates: [(&str, &str); 1] = [(
        "hydra-router.yaml",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/hydra-router.yaml")),
    )];

    for (filename, contents) in templates {
        let target_path = output_dir.join(filename);
        if target_path.exists() && !args.force {
            println!(
                "跳过 {}（文件已存在，如需覆盖请加 --force）",
                target_path.display()
            );
            continue;
        }

        fs::write(&target_path, contents)?;
        println!("已写入 {}", target_path.display());
    }

    Ok(())
}

/// 按精度换算成十进制数量；超出 `Decimal` 表示范围时返回 `None`。
pub fn to_units(amount: Balance, decimals: u32) -> Option<Decimal> {
    let mantissa = i128::try_from(amount).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, decimals).ok()
}

pub fn format_units(amount: Balance, decimals: u32) -> String {
    to_units(amount, decimals)
        .map(|value| value.normalize().to_string())
        .unwrap_or_else(|| amount.to_string())
}

/// 每单位输入可得的输出数量。
pub fn unit_price(
    amount_in: Balance,
    decimals_in: u32,
    amount_out: Balance,
    decimals_out: u32,
) -> Option<Decimal> {
    let amount_in = to_units(amount_in, decimals_in)?;
    let amount_out = to_units(amount_out, decimals_out)?;
    amount_out.checked_div(amount_in).map(|price| price.round_dp(12).normalize())
}
