mod cli;
mod service;

use clap::Parser;
use cli::{Cli, Commands};
use logvault::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run => service::run(config).await?,
        Commands::VerifyChain(args) => service::verify_chain(config, args.source).await?,
    }

    Ok(())
}
