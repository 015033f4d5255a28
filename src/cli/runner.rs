use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};

use crate::cli::args::{Cli, Command, QuoteCmd, RoutesCmd, SyncProxiesCmd};
use crate::cli::context::{
    build_executor, build_factory, factory_settings, format_units, init_configs,
    resolve_snapshot_path, unit_price,
};
use crate::config::HydraRouterConfig;
use crate::hydra::{QuoteArgs, QuoteError, QuoteService, SwapPair, build_swap_call};
use crate::sync::{ChainProxySyncService, ProxySnapshot, SyncState};

pub async fn run(cli: Cli, config: HydraRouterConfig) -> Result<()> {
    crate::monitoring::try_init_prometheus(&config.metrics.prometheus)?;

    match cli.command {
        Command::Quote(cmd) => run_quote(cmd, &config).await,
        Command::Routes(cmd) => run_routes(cmd, &config).await,
        Command::SyncProxies(cmd) => run_sync_proxies(cmd, &config).await,
        Command::Init(args) => init_configs(args),
    }
}

async fn run_quote(cmd: QuoteCmd, config: &HydraRouterConfig) -> Result<()> {
    let snapshot = resolve_snapshot_path(cmd.snapshot.snapshot, config)?;
    let factory = build_factory(snapshot, config, factory_settings(&config.router))?;
    let service = QuoteService::new(factory, config.router.quote_timeout());

    let args = if cmd.buy {
        QuoteArgs::buy(cmd.asset_in, cmd.asset_out, cmd.amount)
    } else {
        QuoteArgs::sell(cmd.asset_in, cmd.asset_out, cmd.amount)
    };
    let quote = service.quote(args).await.map_err(|err| match err {
        QuoteError::NoRoute { pair } => anyhow!("{pair} 之间没有可用路由，请检查快照中的池子"),
        other => anyhow!(other),
    })?;
    let route = quote.route()?;

    let slippage_bps = cmd.slippage_bps.unwrap_or(config.router.slippage_bps);
    let call = build_swap_call(&quote, slippage_bps)?;

    info!(
        target: "hydra::cli",
        pair = %args.pair(),
        direction = %args.direction,
        hops = route.len(),
        "报价完成"
    );

    println!("direction: {}", args.direction);
    println!("route:     {route}");
    println!(
        "amount in:  {} ({})",
        quote.amount_in(),
        format_units(quote.amount_in(), cmd.decimals_in)
    );
    println!(
        "amount out: {} ({})",
        quote.amount_out(),
        format_units(quote.amount_out(), cmd.decimals_out)
    );
    match unit_price(quote.amount_in(), cmd.decimals_in, quote.amount_out(), cmd.decimals_out) {
        Some(price) => println!("price:      {price} out/in"),
        None => println!("price:      n/a"),
    }
    println!("call:");
    println!("{}", serde_json::to_string_pretty(&call)?);
    Ok(())
}

async fn run_routes(cmd: RoutesCmd, config: &HydraRouterConfig) -> Result<()> {
    let snapshot = resolve_snapshot_path(cmd.snapshot.snapshot, config)?;
    let mut settings = factory_settings(&config.router);
    if let Some(max_hops) = cmd.max_hops {
        settings.max_hops = max_hops;
    }
    let factory = build_factory(snapshot, config, settings)?;

    let pair = SwapPair::new(cmd.asset_in, cmd.asset_out);
    let graph = factory.routes_graph(pair);
    let routes = factory
        .executor()
        .submit(&graph)
        .join()
        .await
        .map_err(|err| anyhow!(QuoteError::from(err)))?;

    if routes.is_empty() {
        warn!(target: "hydra::cli", pair = %pair, max_hops = settings.max_hops, "没有可用路由");
        println!("{pair}: 没有可用路由");
        return Ok(());
    }
    println!("{pair}: {} 条路由（最多 {} 跳）", routes.len(), settings.max_hops);
    for (index, route) in routes.iter().enumerate() {
        println!("{:<3} {route}", index + 1);
    }
    Ok(())
}

async fn run_sync_proxies(cmd: SyncProxiesCmd, config: &HydraRouterConfig) -> Result<()> {
    let snapshot = ProxySnapshot::load(&cmd.snapshot)?;
    let repository = Arc::new(snapshot.repository());
    let reader = Arc::new(snapshot.reader());

    let service = Arc::new(ChainProxySyncService::new(
        snapshot.chain.clone(),
        reader.clone(),
        reader,
        repository.clone(),
        build_executor(&config.router),
    ));

    let generation = service.sync_up();
    let summary = match service.wait_settled().await {
        SyncState::Synced(summary) => summary,
        SyncState::Failed { error, .. } => bail!("代理账户同步失败: {error}"),
        other => bail!("代理账户同步未完成（generation {generation}）: {other:?}"),
    };

    let wallets = repository.snapshot();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&wallets)?);
        return Ok(());
    }

    println!(
        "chain {}: 保存 {} 个、移除 {} 个钱包",
        service.chain().chain_id,
        summary.saved,
        summary.removed
    );
    for wallet in wallets {
        println!(
            "{:<38} {:<24} {:?}",
            wallet.identifier(),
            wallet.info.name,
            wallet.info.kind
        );
    }
    Ok(())
}
