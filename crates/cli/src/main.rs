mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "gcloud-storage",
    version,
    about = "Read and write objects in a Google Cloud Storage bucket"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Config file (default: <config dir>/gcloud-storage/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);

    match cli.command {
        commands::Command::Init(args) => commands::init::run(&config_path, args).await,
        commands::Command::Put(args) => commands::put::run(&config_path, args).await,
        commands::Command::Get(args) => commands::get::run(&config_path, args).await,
        commands::Command::Rm(args) => commands::rm::run(&config_path, args).await,
        commands::Command::Exists(args) => commands::exists::run(&config_path, args).await,
        commands::Command::Size(args) => commands::size::run(&config_path, args).await,
        commands::Command::Url(args) => commands::url::run(&config_path, args).await,
    }
}
