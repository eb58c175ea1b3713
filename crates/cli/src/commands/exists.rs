use std::path::Path;

use anyhow::Result;
use clap::Args;

use gcloud_storage_core::Storage;

use crate::config::AppConfig;

#[derive(Args)]
pub struct ExistsArgs {
    /// Object name
    name: String,
}

pub async fn run(config_path: &Path, args: ExistsArgs) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let storage = config.open_storage()?;
    if !storage.exists(&args.name).await? {
        anyhow::bail!("{} does not exist", args.name);
    }
    println!("{} exists", args.name);
    Ok(())
}
