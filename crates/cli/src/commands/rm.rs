use std::path::Path;

use anyhow::Result;
use clap::Args;

use gcloud_storage_core::Storage;

use crate::config::AppConfig;

#[derive(Args)]
pub struct RmArgs {
    /// Object name
    name: String,
}

pub async fn run(config_path: &Path, args: RmArgs) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let storage = config.open_storage()?;
    storage.delete(&args.name).await?;
    println!("Deleted {}", args.name);
    Ok(())
}
