use anyhow::Result;
use clap::Parser;

use hydra_router::cli::{self, args::Cli, context::init_tracing, context::load_configuration};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.global.logging)?;
    cli::run(cli, config).await
}
