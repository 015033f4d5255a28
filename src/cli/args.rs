use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hydra-router", version, about = "HydraDX 多跳路由报价与代理账户同步")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 hydra-router.yaml 或 config/hydra-router.yaml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 基于池子快照计算最优报价并生成兑换调用
    Quote(QuoteCmd),
    /// 列出资产对之间的全部候选路由
    Routes(RoutesCmd),
    /// 基于代理快照执行一次代理账户同步
    #[command(name = "sync-proxies")]
    SyncProxies(SyncProxiesCmd),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug)]
pub struct SnapshotArg {
    #[arg(
        long,
        value_name = "FILE",
        help = "池子状态快照（JSON/YAML），缺省使用 global.snapshot_path"
    )]
    pub snapshot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct QuoteCmd {
    #[arg(long, help = "输入资产 ID")]
    pub asset_in: u32,
    #[arg(long, help = "输出资产 ID")]
    pub asset_out: u32,
    #[arg(long, help = "数量（最小单位）；卖出为输入数量，买入为期望输出数量")]
    pub amount: u128,
    #[arg(long, help = "按期望输出数量报价（买入）")]
    pub buy: bool,
    #[arg(long, help = "允许滑点（基点），缺省使用 router.slippage_bps")]
    pub slippage_bps: Option<u32>,
    #[arg(long, default_value_t = 12, help = "输入资产精度，仅用于展示价格")]
    pub decimals_in: u32,
    #[arg(long, default_value_t = 12, help = "输出资产精度，仅用于展示价格")]
    pub decimals_out: u32,
    #[command(flatten)]
    pub snapshot: SnapshotArg,
}

#[derive(Args, Debug)]
pub struct RoutesCmd {
    #[arg(long, help = "输入资产 ID")]
    pub asset_in: u32,
    #[arg(long, help = "输出资产 ID")]
    pub asset_out: u32,
    #[arg(long, help = "最大跳数，缺省使用 router.max_hops")]
    pub max_hops: Option<usize>,
    #[command(flatten)]
    pub snapshot: SnapshotArg,
}

#[derive(Args, Debug)]
pub struct SyncProxiesCmd {
    #[arg(
        long,
        value_name = "FILE",
        help = "代理快照（JSON/YAML）：链信息、代理列表、身份与本地钱包"
    )]
    pub snapshot: PathBuf,
    #[arg(long, help = "以 JSON 输出同步后的钱包列表")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn quote_command_parses() {
        let cli = Cli::parse_from([
            "hydra-router",
            "quote",
            "--asset-in",
            "1",
            "--asset-out",
            "9",
            "--amount",
            "10000000000",
            "--buy",
            "--snapshot",
            "pools.yaml",
        ]);
        match cli.command {
            Command::Quote(cmd) => {
                assert_eq!((cmd.asset_in, cmd.asset_out, cmd.amount), (1, 9, 10_000_000_000));
                assert!(cmd.buy);
                assert_eq!(cmd.slippage_bps, None);
                assert_eq!(cmd.snapshot.snapshot, Some(PathBuf::from("pools.yaml")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sync_proxies_requires_snapshot() {
        assert!(Cli::try_parse_from(["hydra-router", "sync-proxies"]).is_err());
        let cli = Cli::parse_from([
            "hydra-router",
            "-c",
            "cfg.toml",
            "sync-proxies",
            "--snapshot",
            "p.json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.toml")));
        assert!(matches!(cli.command, Command::SyncProxies(_)));
    }
}
