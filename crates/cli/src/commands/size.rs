use std::path::Path;

use anyhow::Result;
use clap::Args;

use gcloud_storage_core::Storage;

use crate::config::AppConfig;
use crate::progress;

#[derive(Args)]
pub struct SizeArgs {
    /// Object name
    name: String,

    /// Print a human-readable size
    #[arg(short = 'H', long)]
    human: bool,
}

pub async fn run(config_path: &Path, args: SizeArgs) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let storage = config.open_storage()?;
    let size = storage.size(&args.name).await?;
    if args.human {
        println!("{}", progress::format_bytes(size));
    } else {
        println!("{size}");
    }
    Ok(())
}
