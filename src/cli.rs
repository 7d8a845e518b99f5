use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "logvault")]
#[command(about = "Tamper-evident edge log archiver", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the archival service (scheduler + worker pool)
    Run,
    /// Recompute and check a source's audit chain
    VerifyChain(VerifyChainArgs),
}

#[derive(clap::Args, Debug)]
pub struct VerifyChainArgs {
    /// Source whose chain to verify
    #[arg(long)]
    pub source: Uuid,
}
