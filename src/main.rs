mod commands;
mod config;
mod digest;
mod extract;
mod fetcher;
mod notify;
mod page;
mod slot;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "courtwatch")]
#[command(about = "Watch a court booking calendar and report newly available slots")]
struct Cli {
    /// Use an alternate config file
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scrape cycle: extract slots, record new ones, email the digest
    Check {
        /// Days to scan, today included (overrides the configured default)
        #[arg(long)]
        days: Option<u32>,

        /// Show the fetcher's browser window instead of running headless
        #[arg(long)]
        visible: bool,
    },
    /// List slots already recorded in the store
    Seen {
        /// Only show slots observed for this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    match cli.command {
        Commands::Check { days, visible } => commands::check::run(&config, days, !visible).await,
        Commands::Seen { date } => commands::seen::run(&config, date).await,
    }
}
